//! Model registry
//!
//! Process-scoped context holding the loaded predictors. Built once at
//! startup, initialized explicitly (fail-fast), shared read-only by request
//! handlers, and shut down explicitly when the server stops.
//!
//! Predictors that are not reentrant (or that are registered serialized) get
//! a mutex scoped to their modality; all calls through the registry hold it
//! for the duration of `predict`. Other modalities are unaffected.

use crate::predictors::{ModalityInput, Predictor, PredictorError};
use crate::types::Modality;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use vettriage_common::{Error, Result};

struct RegisteredPredictor {
    predictor: Arc<dyn Predictor>,
    /// Per-modality lock for non-reentrant predictors
    lock: Option<Mutex<()>>,
}

/// Builder collecting predictors before the registry is frozen
#[derive(Default)]
pub struct ModelRegistryBuilder {
    entries: BTreeMap<Modality, RegisteredPredictor>,
}

impl ModelRegistryBuilder {
    /// Register a predictor for its modality
    ///
    /// Calls are serialized only if the predictor reports it is not reentrant.
    pub fn register(self, predictor: Arc<dyn Predictor>) -> Self {
        let serialize = !predictor.is_reentrant();
        self.insert(predictor, serialize)
    }

    /// Register a predictor whose calls are always serialized
    pub fn register_serialized(self, predictor: Arc<dyn Predictor>) -> Self {
        self.insert(predictor, true)
    }

    fn insert(mut self, predictor: Arc<dyn Predictor>, serialize: bool) -> Self {
        let modality = predictor.modality();
        let entry = RegisteredPredictor {
            lock: serialize.then(|| Mutex::new(())),
            predictor,
        };
        if let Some(previous) = self.entries.insert(modality, entry) {
            warn!(
                modality = %modality,
                replaced = previous.predictor.name(),
                "Predictor registered twice for the same modality, keeping the latest"
            );
        }
        self
    }

    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            entries: self.entries,
            shut_down: AtomicBool::new(false),
        }
    }
}

/// Loaded predictors, keyed by modality
pub struct ModelRegistry {
    entries: BTreeMap<Modality, RegisteredPredictor>,
    shut_down: AtomicBool,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Initialize every registered predictor
    ///
    /// # Errors
    /// Returns `Error::Startup` for the first predictor that fails; the
    /// service must not start with a broken model.
    pub async fn initialize(&self) -> Result<()> {
        for (modality, entry) in &self.entries {
            let name = entry.predictor.name();
            match entry.predictor.initialize().await {
                Ok(()) => {
                    info!(
                        modality = %modality,
                        predictor = name,
                        serialized = entry.lock.is_some(),
                        "Model loaded"
                    );
                }
                Err(e) => {
                    error!(modality = %modality, predictor = name, error = %e, "Model failed to load");
                    return Err(Error::Startup(format!(
                        "{} model ({}) failed to initialize: {}",
                        modality, name, e
                    )));
                }
            }
        }
        Ok(())
    }

    /// Run one prediction on the predictor registered for the input's modality
    ///
    /// # Errors
    /// * `PredictorError::NotLoaded` - no predictor for that modality
    /// * any error returned by the predictor itself
    pub async fn predict(&self, input: &ModalityInput) -> std::result::Result<serde_json::Value, PredictorError> {
        let modality = input.modality();
        let entry = self
            .entries
            .get(&modality)
            .ok_or(PredictorError::NotLoaded(modality))?;

        let _guard = match &entry.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        entry.predictor.predict(input).await
    }

    pub fn is_loaded(&self, modality: Modality) -> bool {
        self.entries.contains_key(&modality)
    }

    /// Loaded modalities in merge order
    pub fn loaded_modalities(&self) -> Vec<Modality> {
        self.entries.keys().copied().collect()
    }

    /// Shut down every predictor; later calls are no-ops
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for (modality, entry) in &self.entries {
            entry.predictor.shutdown().await;
            info!(modality = %modality, predictor = entry.predictor.name(), "Model unloaded");
        }
    }
}
