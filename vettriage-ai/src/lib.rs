//! vettriage-ai library interface
//!
//! Exposes the triage pipeline (predictors, registry, fusion, coordinator)
//! and the HTTP router for the binary and for integration testing.

pub mod api;
pub mod coordinator;
pub mod error;
pub mod fusion;
pub mod predictors;
pub mod registry;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use coordinator::Coordinator;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Request coordinator (owns the model registry)
    pub coordinator: Arc<Coordinator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last predictor failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Remember the most recent failure for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::health_routes())
        .merge(api::analyze_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
