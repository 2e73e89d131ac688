//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::types::Modality;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("healthy")
    pub status: String,
    /// Service name ("vettriage-ai")
    pub service: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Commit, build time and profile stamped by build.rs
    pub build: BuildInfo,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Modalities with a registered predictor, in merge order
    pub models_loaded: Vec<Modality>,
    /// Last predictor failure if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub git_hash: &'static str,
    pub timestamp: &'static str,
    pub profile: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            git_hash: env!("GIT_HASH"),
            timestamp: env!("BUILD_TIMESTAMP"),
            profile: env!("BUILD_PROFILE"),
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "vettriage-ai".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: BuildInfo::current(),
        uptime_seconds,
        models_loaded: state.coordinator.registry().loaded_modalities(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
