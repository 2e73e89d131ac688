//! HTTP model client
//!
//! Talks to a model served over HTTP. Wire formats per modality:
//! - Text: POST JSON `{symptom_text, breed, age, sex}`
//! - Audio: POST multipart, file part `audio`
//! - Image: POST multipart, file part `image` plus text part `symptoms`
//!
//! Model services report failures either through the HTTP status or through
//! an `{"status": "error", "error": "..."}` body; both become
//! [`PredictorError`]s here.

use super::{ModalityInput, Predictor, PredictorError};
use crate::types::Modality;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Longest error body excerpt carried into an error message
const MAX_ERROR_EXCERPT: usize = 200;

pub struct HttpPredictor {
    modality: Modality,
    name: String,
    url: String,
    health_url: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpPredictor {
    /// Create a client for one model service
    ///
    /// # Arguments
    /// * `modality` - Modality the remote model serves
    /// * `url` - Prediction endpoint
    /// * `health_url` - Readiness endpoint probed by `initialize` (optional)
    /// * `timeout` - Per-request timeout
    pub fn new(
        modality: Modality,
        url: impl Into<String>,
        health_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PredictorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictorError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            modality,
            name: format!("{}-http", modality),
            url: url.into(),
            health_url,
            timeout,
            client,
        })
    }

    fn build_request(&self, input: &ModalityInput) -> Result<reqwest::RequestBuilder, PredictorError> {
        let request = self.client.post(&self.url);
        match input {
            ModalityInput::Text {
                symptom_text,
                patient,
            } => Ok(request.json(&json!({
                "symptom_text": symptom_text,
                "breed": patient.breed,
                "age": patient.age,
                "sex": patient.sex,
            }))),
            ModalityInput::Audio { bytes } => {
                let part = Part::bytes(bytes.clone())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| PredictorError::Network(e.to_string()))?;
                Ok(request.multipart(Form::new().part("audio", part)))
            }
            ModalityInput::Image { bytes, symptoms } => {
                let part = Part::bytes(bytes.clone())
                    .file_name("image.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| PredictorError::Network(e.to_string()))?;
                let form = Form::new()
                    .part("image", part)
                    .text("symptoms", symptoms.clone().unwrap_or_default());
                Ok(request.multipart(form))
            }
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> PredictorError {
        if e.is_timeout() {
            PredictorError::Timeout(self.timeout)
        } else {
            PredictorError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, input: &ModalityInput) -> Result<Value, PredictorError> {
        if input.modality() != self.modality {
            return Err(PredictorError::InputMismatch {
                expected: self.modality,
                got: input.modality(),
            });
        }

        debug!(predictor = %self.name, url = %self.url, "Sending prediction request");

        let response = self
            .build_request(input)?
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(PredictorError::Http {
                status: status.as_u16(),
                message: error_excerpt(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| PredictorError::Decode(format!("Response is not JSON: {}", e)))?;

        interpret_body(value)
    }

    async fn initialize(&self) -> Result<(), PredictorError> {
        let Some(health_url) = &self.health_url else {
            debug!(predictor = %self.name, "No health URL configured, skipping readiness probe");
            return Ok(());
        };

        let response = self
            .client
            .get(health_url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PredictorError::Http {
                status: status.as_u16(),
                message: error_excerpt(&body),
            });
        }

        info!(predictor = %self.name, url = %health_url, "Model service ready");
        Ok(())
    }
}

/// Turn a decoded 2xx body into the model payload
///
/// - `{"status": "error", "error": ...}` or any object with a string `error` → `Remote`
/// - `{"status": "success", "data": {...}}` → the `data` object
/// - anything else → the body itself
fn interpret_body(value: Value) -> Result<Value, PredictorError> {
    if let Value::Object(map) = &value {
        let status = map.get("status").and_then(Value::as_str);
        let error = map.get("error").and_then(Value::as_str);

        if status == Some("error") {
            return Err(PredictorError::Remote(
                error.unwrap_or("model reported an error").to_string(),
            ));
        }
        if let Some(message) = error {
            return Err(PredictorError::Remote(message.to_string()));
        }
        if status == Some("success") {
            if let Some(data) = map.get("data").filter(|d| d.is_object()) {
                return Ok(data.clone());
            }
        }
    }
    Ok(value)
}

/// Best-effort error message from a failed response body
fn error_excerpt(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = map.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_EXCERPT).collect()
}
