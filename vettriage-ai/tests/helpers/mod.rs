//! Test Helper Utilities
//!
//! Scripted predictors and app wiring shared by the vettriage-ai
//! integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vettriage_ai::coordinator::Coordinator;
use vettriage_ai::predictors::{ModalityInput, Predictor, PredictorError};
use vettriage_ai::registry::ModelRegistry;
use vettriage_ai::types::Modality;
use vettriage_ai::AppState;

/// What a scripted predictor does when called
#[derive(Debug, Clone)]
pub enum Behavior {
    Respond(Value),
    Fail(String),
    Panic,
}

/// Predictor with scripted behavior, optional latency and call tracking
pub struct ScriptedPredictor {
    modality: Modality,
    behavior: Behavior,
    delay: Option<Duration>,
    reentrant: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_input: std::sync::Mutex<Option<ModalityInput>>,
}

impl ScriptedPredictor {
    pub fn new(modality: Modality, behavior: Behavior) -> Self {
        Self {
            modality,
            behavior,
            delay: None,
            reentrant: true,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_input: std::sync::Mutex::new(None),
        }
    }

    pub fn responding(modality: Modality, payload: Value) -> Self {
        Self::new(modality, Behavior::Respond(payload))
    }

    pub fn failing(modality: Modality, message: &str) -> Self {
        Self::new(modality, Behavior::Fail(message.to_string()))
    }

    pub fn panicking(modality: Modality) -> Self {
        Self::new(modality, Behavior::Panic)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn non_reentrant(mut self) -> Self {
        self.reentrant = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `predict` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Option<ModalityInput> {
        self.last_input.lock().unwrap().clone()
    }
}

#[async_trait]
impl Predictor for ScriptedPredictor {
    fn modality(&self) -> Modality {
        self.modality
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn predict(&self, input: &ModalityInput) -> Result<Value, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Respond(payload) => Ok(payload.clone()),
            Behavior::Fail(message) => Err(PredictorError::Remote(message.clone())),
            Behavior::Panic => panic!("scripted predictor panic"),
        }
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}

pub fn text_payload(disease: &str, confidence: f64, treatments: &[&str], urgent: bool) -> Value {
    json!({
        "top_disease": disease,
        "top_confidence": confidence,
        "top_treatments": treatments,
        "urgent_care": urgent,
    })
}

pub fn audio_payload(disease: &str, confidence: f64) -> Value {
    json!({
        "predictions": [
            {"disease": disease, "confidence": confidence},
            {"disease": "Healthy", "confidence": 0.01}
        ]
    })
}

pub fn image_payload(diagnosis: &str, confidence: f64, treatments: &[&str], emergency: bool) -> Value {
    json!({
        "medical_advice": {
            "diagnosis": diagnosis,
            "confidence": confidence,
            "treatments": treatments,
            "is_emergency": emergency,
        }
    })
}

pub fn registry_of(predictors: Vec<Arc<ScriptedPredictor>>) -> Arc<ModelRegistry> {
    let builder = predictors.into_iter().fold(ModelRegistry::builder(), |b, p| {
        b.register(p as Arc<dyn Predictor>)
    });
    Arc::new(builder.build())
}

pub fn coordinator_of(predictors: Vec<Arc<ScriptedPredictor>>, timeout: Duration) -> Coordinator {
    Coordinator::new(registry_of(predictors), timeout)
}

pub fn app_state_of(predictors: Vec<Arc<ScriptedPredictor>>) -> AppState {
    AppState::new(Arc::new(coordinator_of(predictors, Duration::from_secs(5))))
}
