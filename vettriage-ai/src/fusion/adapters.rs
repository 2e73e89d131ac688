// Modality Adapters - Raw Payload Normalization
//
// Each model returns its own payload shape. An adapter turns one successful
// PredictionResult into at most one Diagnosis; failed results and payloads
// missing their required fields yield none (the modality is then only listed
// as attempted).

use crate::fusion::{Confidence, Diagnosis};
use crate::types::{Modality, PredictionResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Text model payload (fields the report uses)
#[derive(Debug, Deserialize)]
struct TextPayload {
    top_disease: String,
    top_confidence: Confidence,
    #[serde(default)]
    top_treatments: Option<Vec<String>>,
    #[serde(default)]
    urgent_care: Option<bool>,
}

/// Audio model payload; predictions are ranked by confidence, highest first
#[derive(Debug, Deserialize)]
struct AudioPayload {
    predictions: Vec<AudioPrediction>,
}

// Optional fields are Option so an explicit null reads the same as a missing key
#[derive(Debug, Deserialize)]
struct AudioPrediction {
    #[serde(default)]
    disease: Option<String>,
    #[serde(default)]
    confidence: Option<Confidence>,
}

/// Image model payload
#[derive(Debug, Deserialize)]
struct ImagePayload {
    medical_advice: MedicalAdvice,
}

#[derive(Debug, Deserialize)]
struct MedicalAdvice {
    diagnosis: String,
    confidence: Confidence,
    #[serde(default)]
    treatments: Option<Vec<String>>,
    #[serde(default)]
    is_emergency: Option<bool>,
}

const UNKNOWN_CONDITION: &str = "Unknown";

/// Adapt a prediction result into a diagnosis
///
/// # Returns
/// * `Some(Diagnosis)` - successful result with a usable payload
/// * `None` - failed result, or payload missing required fields
pub fn adapt(result: &PredictionResult) -> Option<Diagnosis> {
    if !result.is_success() {
        debug!(modality = %result.modality, "Skipping failed prediction");
        return None;
    }

    let Some(data) = result.data.as_ref() else {
        warn!(modality = %result.modality, "Successful prediction carried no payload");
        return None;
    };

    let diagnosis = match result.modality {
        Modality::Text => adapt_text(data),
        Modality::Audio => adapt_audio(data),
        Modality::Image => adapt_image(data),
    }?;

    if !diagnosis.confidence.is_finite() {
        warn!(
            modality = %result.modality,
            confidence = diagnosis.confidence,
            "Discarding diagnosis with non-finite confidence"
        );
        return None;
    }

    Some(Diagnosis {
        confidence: diagnosis.confidence.clamp(0.0, 1.0),
        ..diagnosis
    })
}

/// Text: `top_disease` + `top_confidence` required; `urgent_care` marks an emergency
fn adapt_text(data: &Value) -> Option<Diagnosis> {
    let payload: TextPayload = parse_payload(Modality::Text, data)?;
    Some(Diagnosis {
        source: Modality::Text,
        diagnosis: payload.top_disease,
        confidence: payload.top_confidence,
        treatments: payload.top_treatments.unwrap_or_default(),
        emergency: payload.urgent_care.unwrap_or_default(),
    })
}

/// Audio: first (highest-confidence) prediction only; never treatments or emergencies
fn adapt_audio(data: &Value) -> Option<Diagnosis> {
    let payload: AudioPayload = parse_payload(Modality::Audio, data)?;
    let Some(top) = payload.predictions.into_iter().next() else {
        debug!("Audio prediction list is empty");
        return None;
    };
    Some(Diagnosis {
        source: Modality::Audio,
        diagnosis: top
            .disease
            .unwrap_or_else(|| UNKNOWN_CONDITION.to_string()),
        confidence: top.confidence.unwrap_or_default(),
        treatments: Vec::new(),
        emergency: false,
    })
}

/// Image: `medical_advice` with `diagnosis` + `confidence` required; `is_emergency` marks an emergency
fn adapt_image(data: &Value) -> Option<Diagnosis> {
    let payload: ImagePayload = parse_payload(Modality::Image, data)?;
    let advice = payload.medical_advice;
    Some(Diagnosis {
        source: Modality::Image,
        diagnosis: advice.diagnosis,
        confidence: advice.confidence,
        treatments: advice.treatments.unwrap_or_default(),
        emergency: advice.is_emergency.unwrap_or_default(),
    })
}

fn parse_payload<T: DeserializeOwned>(modality: Modality, data: &Value) -> Option<T> {
    match T::deserialize(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(modality = %modality, error = %e, "Prediction payload missing required fields");
            None
        }
    }
}
