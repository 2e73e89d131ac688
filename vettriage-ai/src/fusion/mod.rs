// Fusion Module - Two-Stage Report Fusion
//
// Stage 1 (adapters): raw model payload -> normalized Diagnosis
// Stage 2 (synthesizer): ordered Diagnosis list -> ComprehensiveReport

pub mod adapters;
pub mod synthesizer;

pub use adapters::adapt;
pub use synthesizer::synthesize;

use crate::types::{Modality, PatientInfo};
use serde::{Serialize, Serializer};

/// Diagnosis confidence (0.0-1.0)
pub type Confidence = f64;

/// Maximum number of entries in the treatment recommendation list
pub const MAX_TREATMENT_RECOMMENDATIONS: usize = 10;

/// Mean confidence must be strictly above this for a high-confidence assessment
pub const HIGH_CONFIDENCE_THRESHOLD: Confidence = 0.7;

/// Mean confidence must be strictly above this for a moderate-confidence assessment
pub const MODERATE_CONFIDENCE_THRESHOLD: Confidence = 0.5;

pub const ASSESSMENT_NO_CONCERNS: &str = "No immediate concerns detected";
pub const ASSESSMENT_URGENT: &str = "URGENT: Immediate veterinary attention recommended";
pub const ASSESSMENT_HIGH_CONFIDENCE: &str =
    "High confidence diagnosis - Follow recommended treatments";
pub const ASSESSMENT_MODERATE_CONFIDENCE: &str =
    "Moderate confidence - Monitor closely and consult veterinarian";
pub const ASSESSMENT_LOW_CONFIDENCE: &str = "Low confidence - Additional evaluation recommended";

/// Normalized single-condition prediction from one modality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    /// Modality that produced this diagnosis (serialized as its source label)
    #[serde(serialize_with = "serialize_source")]
    pub source: Modality,

    /// Condition label
    pub diagnosis: String,

    /// Confidence (0.0-1.0)
    pub confidence: Confidence,

    /// Recommended treatments, in model order
    pub treatments: Vec<String>,

    /// Whether the modality signalled an emergency
    pub emergency: bool,
}

/// Triage urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    High,
}

/// Merged triage report
///
/// Contains no clock-derived data: synthesizing the same inputs twice gives
/// identical reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensiveReport {
    pub patient_info: PatientInfo,

    /// Every modality that was attempted, successful or not
    #[serde(serialize_with = "serialize_result_keys")]
    pub analyses_performed: Vec<Modality>,

    /// Diagnoses in merge order (text, audio, image)
    pub primary_diagnoses: Vec<Diagnosis>,

    pub urgency_level: UrgencyLevel,

    /// One message per modality that signalled an emergency, in merge order
    pub emergency_flags: Vec<String>,

    pub overall_assessment: String,

    /// Mean diagnosis confidence; absent when there are no diagnoses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_confidence: Option<Confidence>,

    /// Deduplicated treatments, first-seen order, at most 10
    pub treatment_recommendations: Vec<String>,
}

fn serialize_source<S: Serializer>(source: &Modality, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(source.diagnosis_source())
}

fn serialize_result_keys<S: Serializer>(
    modalities: &[Modality],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(modalities.iter().map(|m| m.result_key()))
}
