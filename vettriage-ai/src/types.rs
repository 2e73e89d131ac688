//! Core domain types shared by predictors, fusion and the coordinator
//!
//! A request is fanned out per [`Modality`]; every attempted modality produces
//! exactly one [`PredictionResult`], successful or not. The fixed ordering of
//! `Modality` (text, audio, image) is the merge order used everywhere results
//! are combined.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Modality
// ============================================================================

/// One input channel with its own model
///
/// The derived `Ord` (Text < Audio < Image) is the deterministic merge order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
    Image,
}

impl Modality {
    /// All modalities in merge order
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Audio, Modality::Image];

    /// Key used for `analyses_performed` and `individual_results`
    pub fn result_key(self) -> &'static str {
        match self {
            Modality::Text => "text_analysis",
            Modality::Audio => "audio_analysis",
            Modality::Image => "image_analysis",
        }
    }

    /// Source label carried by a diagnosis from this modality
    pub fn diagnosis_source(self) -> &'static str {
        match self {
            Modality::Text => "text_symptoms",
            Modality::Audio => "audio_analysis",
            Modality::Image => "image_analysis",
        }
    }

    /// Emergency flag message raised when this modality signals an emergency
    ///
    /// Audio has no emergency signal.
    pub fn emergency_message(self) -> Option<&'static str> {
        match self {
            Modality::Text => Some("Text symptoms indicate urgent care needed"),
            Modality::Audio => None,
            Modality::Image => Some("Image analysis indicates emergency condition"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Audio => "audio",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Prediction results
// ============================================================================

/// Outcome status of a single model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Success,
    Error,
}

/// Result of one model call, as reported back to the caller
///
/// Serialized as `{"type": "text", "status": "success", "data": {...}}` or
/// `{"type": "text", "status": "error", "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "type")]
    pub modality: Modality,
    pub status: PredictionStatus,
    /// Opaque model payload (success only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Failure message (error only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    pub fn success(modality: Modality, data: serde_json::Value) -> Self {
        Self {
            modality,
            status: PredictionStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(modality: Modality, message: impl Into<String>) -> Self {
        Self {
            modality,
            status: PredictionStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PredictionStatus::Success
    }
}

// ============================================================================
// Patient context
// ============================================================================

/// Patient context passed through to the text model and the report
///
/// Not validated beyond type; breed names are opaque strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub breed: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<String>,
}

/// Parse an age submitted as a form field
///
/// Anything that is not a non-negative integer is treated as unknown.
pub fn parse_age_str(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

/// Parse an age submitted as a JSON value (number or numeric string)
pub fn parse_age_value(raw: &serde_json::Value) -> Option<u32> {
    match raw {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) => parse_age_str(s),
        _ => None,
    }
}
