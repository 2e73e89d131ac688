//! Model predictors
//!
//! Each trained model (text, audio, image) sits behind the [`Predictor`]
//! trait. Predictors are constructed explicitly at startup and handed to the
//! [`ModelRegistry`](crate::registry::ModelRegistry); nothing is loaded
//! lazily or located by path.
//!
//! # Predictors
//! - **http** - client for a model served over HTTP (the production setup)

pub mod http;

pub use http::HttpPredictor;

use crate::types::{Modality, PatientInfo};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Input for one model call
#[derive(Debug, Clone)]
pub enum ModalityInput {
    /// Free-text symptom description plus patient context
    Text {
        symptom_text: String,
        patient: PatientInfo,
    },
    /// Raw audio recording (WAV)
    Audio { bytes: Vec<u8> },
    /// Raw image plus optional symptom text for context
    Image {
        bytes: Vec<u8>,
        symptoms: Option<String>,
    },
}

impl ModalityInput {
    pub fn modality(&self) -> Modality {
        match self {
            ModalityInput::Text { .. } => Modality::Text,
            ModalityInput::Audio { .. } => Modality::Audio,
            ModalityInput::Image { .. } => Modality::Image,
        }
    }
}

/// Predictor trait - every model implements this
///
/// `predict` returns the model's raw payload. Interpreting the payload is the
/// job of the modality adapters in [`crate::fusion::adapters`].
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Modality this predictor serves
    fn modality(&self) -> Modality;

    /// Predictor identifier for logs (e.g. "text-http")
    fn name(&self) -> &str;

    /// Run one prediction
    ///
    /// # Returns
    /// * `Ok(Value)` - raw model payload
    /// * `Err(_)` - prediction failed (recorded per modality, never aborts a request)
    async fn predict(&self, input: &ModalityInput) -> Result<serde_json::Value, PredictorError>;

    /// Bring the predictor to a ready state; called once at process start
    async fn initialize(&self) -> Result<(), PredictorError> {
        Ok(())
    }

    /// Release resources; called once at process shutdown
    async fn shutdown(&self) {}

    /// Whether concurrent `predict` calls are safe
    ///
    /// Non-reentrant predictors are serialized per modality by the registry.
    fn is_reentrant(&self) -> bool {
        true
    }
}

/// Predictor error
#[derive(Debug, Error)]
pub enum PredictorError {
    /// No predictor registered for the modality
    #[error("{0} model not loaded")]
    NotLoaded(Modality),

    /// Input routed to a predictor of another modality
    #[error("{expected} predictor received {got} input")]
    InputMismatch { expected: Modality, got: Modality },

    /// Could not reach the model service
    #[error("Network error: {0}")]
    Network(String),

    /// Model service answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Model ran but reported an error
    #[error("Model error: {0}")]
    Remote(String),

    /// Model response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Prediction exceeded its time budget
    #[error("Prediction timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Prediction task panicked
    #[error("Prediction task failed: {0}")]
    Panicked(String),
}
