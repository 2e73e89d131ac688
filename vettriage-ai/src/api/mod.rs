//! HTTP API handlers for vettriage-ai
//!
//! - `GET /health` - liveness, loaded models, last failure
//! - `POST /analyze/{text,audio,image}` - one modality, raw result
//! - `POST /analyze/comprehensive` - every supplied modality, fused report

pub mod analyze;
pub mod health;

pub use analyze::analyze_routes;
pub use health::health_routes;
