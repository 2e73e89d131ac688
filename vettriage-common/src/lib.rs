//! # VetTriage Common Library
//!
//! Shared code for the VetTriage services:
//! - Error type used across crates
//! - TOML configuration schema and config file discovery

pub mod config;
pub mod error;

pub use error::{Error, Result};
