//! Request Coordinator
//!
//! Runs the predictors for the inputs present in a request, routes each
//! result through its adapter and synthesizes the report.
//!
//! # Concurrency
//! Each modality runs as its own tokio task bounded by the prediction
//! timeout. Tasks are independent failure domains: an error, a timeout or a
//! panic in one modality becomes an error result for that modality only.
//! Results are buffered and sorted by modality before merging, so completion
//! order never affects the report.
//!
//! # Example
//! ```rust,ignore
//! let coordinator = Coordinator::new(registry, Duration::from_secs(30));
//! let response = coordinator.analyze(AnalysisRequest {
//!     symptom_text: Some("vomiting since yesterday".into()),
//!     ..Default::default()
//! }).await;
//! println!("{}", response.comprehensive_report.overall_assessment);
//! ```

use crate::fusion::{adapt, synthesize, ComprehensiveReport};
use crate::predictors::{ModalityInput, PredictorError};
use crate::registry::ModelRegistry;
use crate::types::{Modality, PatientInfo, PredictionResult};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Multimodal analysis request; any subset of inputs may be present
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub symptom_text: Option<String>,
    pub audio: Option<Vec<u8>>,
    pub image: Option<Vec<u8>>,
    pub patient: PatientInfo,
}

impl AnalysisRequest {
    /// Symptom text, if present and not blank
    pub fn symptom_text(&self) -> Option<&str> {
        self.symptom_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Modalities whose inputs are present, in merge order
    pub fn present_modalities(&self) -> Vec<Modality> {
        let mut present = Vec::new();
        if self.symptom_text().is_some() {
            present.push(Modality::Text);
        }
        if self.audio.as_ref().is_some_and(|a| !a.is_empty()) {
            present.push(Modality::Audio);
        }
        if self.image.as_ref().is_some_and(|i| !i.is_empty()) {
            present.push(Modality::Image);
        }
        present
    }

    /// Reject a request with nothing to analyze
    pub fn ensure_inputs(&self) -> vettriage_common::Result<()> {
        if self.present_modalities().is_empty() {
            return Err(vettriage_common::Error::InvalidInput(
                "No input provided: supply symptom_text, audio or image".to_string(),
            ));
        }
        Ok(())
    }

    fn into_inputs(self) -> Vec<ModalityInput> {
        let symptom_text = self.symptom_text().map(str::to_string);
        let mut inputs = Vec::new();

        if let Some(text) = &symptom_text {
            inputs.push(ModalityInput::Text {
                symptom_text: text.clone(),
                patient: self.patient,
            });
        }
        if let Some(bytes) = self.audio.filter(|a| !a.is_empty()) {
            inputs.push(ModalityInput::Audio { bytes });
        }
        if let Some(bytes) = self.image.filter(|i| !i.is_empty()) {
            // Image model takes the symptom text as extra context
            inputs.push(ModalityInput::Image {
                bytes,
                symptoms: symptom_text,
            });
        }
        inputs
    }
}

/// Raw per-modality results, keyed like `analyses_performed`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndividualResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_analysis: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_analysis: Option<PredictionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<PredictionResult>,
}

impl IndividualResults {
    fn insert(&mut self, result: PredictionResult) {
        let slot = match result.modality {
            Modality::Text => &mut self.text_analysis,
            Modality::Audio => &mut self.audio_analysis,
            Modality::Image => &mut self.image_analysis,
        };
        *slot = Some(result);
    }

    /// Present results in merge order
    pub fn iter(&self) -> impl Iterator<Item = &PredictionResult> {
        [&self.text_analysis, &self.audio_analysis, &self.image_analysis]
            .into_iter()
            .flatten()
    }
}

/// Full answer to a multimodal analysis
///
/// The timestamp lives here, outside the report body.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub status: &'static str,
    pub individual_results: IndividualResults,
    pub comprehensive_report: ComprehensiveReport,
    pub analysis_timestamp: DateTime<Utc>,
}

pub struct Coordinator {
    registry: Arc<ModelRegistry>,
    predict_timeout: Duration,
}

impl Coordinator {
    pub fn new(registry: Arc<ModelRegistry>, predict_timeout: Duration) -> Self {
        Self {
            registry,
            predict_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Analyze every modality present in the request and build the report
    ///
    /// Never fails: modality failures are reported inside the response.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResponse {
        let request_id = Uuid::new_v4();
        let patient = request.patient.clone();
        let inputs = request.into_inputs();
        let attempted: Vec<Modality> = inputs.iter().map(ModalityInput::modality).collect();

        info!(
            request_id = %request_id,
            modalities = ?attempted,
            "Starting multimodal analysis"
        );

        let tasks = inputs
            .into_iter()
            .map(|input| self.spawn_prediction(request_id, input));
        let mut results = join_all(tasks).await;
        results.sort_by_key(|r| r.modality);

        let diagnoses = results.iter().filter_map(adapt).collect();
        let comprehensive_report = synthesize(&attempted, diagnoses, patient);

        let mut individual_results = IndividualResults::default();
        for result in results {
            individual_results.insert(result);
        }

        info!(
            request_id = %request_id,
            diagnoses = comprehensive_report.primary_diagnoses.len(),
            urgency = ?comprehensive_report.urgency_level,
            "Multimodal analysis complete"
        );

        AnalysisResponse {
            request_id,
            status: "success",
            individual_results,
            comprehensive_report,
            analysis_timestamp: Utc::now(),
        }
    }

    /// Run a single fault-isolated, time-bounded prediction
    pub async fn analyze_single(&self, input: ModalityInput) -> PredictionResult {
        self.spawn_prediction(Uuid::new_v4(), input).await
    }

    fn spawn_prediction(
        &self,
        request_id: Uuid,
        input: ModalityInput,
    ) -> impl Future<Output = PredictionResult> {
        let modality = input.modality();
        let registry = Arc::clone(&self.registry);
        let timeout = self.predict_timeout;

        let handle =
            tokio::spawn(async move { run_prediction(&registry, &input, timeout, request_id).await });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let error = PredictorError::Panicked(e.to_string());
                    warn!(
                        request_id = %request_id,
                        modality = %modality,
                        error = %error,
                        "Prediction task aborted"
                    );
                    PredictionResult::failure(modality, error.to_string())
                }
            }
        }
    }
}

async fn run_prediction(
    registry: &ModelRegistry,
    input: &ModalityInput,
    timeout: Duration,
    request_id: Uuid,
) -> PredictionResult {
    let modality = input.modality();
    let started = Instant::now();

    let outcome = match tokio::time::timeout(timeout, registry.predict(input)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(PredictorError::Timeout(timeout)),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(data) => {
            info!(
                request_id = %request_id,
                modality = %modality,
                elapsed_ms,
                "Prediction succeeded"
            );
            PredictionResult::success(modality, data)
        }
        Err(e) => {
            warn!(
                request_id = %request_id,
                modality = %modality,
                elapsed_ms,
                error = %e,
                "Prediction failed (isolated to this modality)"
            );
            PredictionResult::failure(modality, e.to_string())
        }
    }
}
