// Report Synthesizer - Diagnosis Fusion
//
// Merges the per-modality diagnoses into one ComprehensiveReport:
// - urgency: high as soon as any diagnosis signals an emergency, never reverts
// - emergency flags: one message per signalling modality, merge order
// - overall confidence: unweighted mean of all diagnosis confidences
// - treatments: concatenated in merge order, first occurrence kept, capped at 10

use crate::fusion::{
    ComprehensiveReport, Confidence, Diagnosis, UrgencyLevel, ASSESSMENT_HIGH_CONFIDENCE,
    ASSESSMENT_LOW_CONFIDENCE, ASSESSMENT_MODERATE_CONFIDENCE, ASSESSMENT_NO_CONCERNS,
    ASSESSMENT_URGENT, HIGH_CONFIDENCE_THRESHOLD, MAX_TREATMENT_RECOMMENDATIONS,
    MODERATE_CONFIDENCE_THRESHOLD,
};
use crate::types::{Modality, PatientInfo};
use std::collections::HashSet;
use tracing::debug;

/// Synthesize a comprehensive report
///
/// # Arguments
/// * `attempted` - Modalities that were run, successful or not
/// * `diagnoses` - Diagnoses produced by the adapters
/// * `patient_info` - Patient context, passed through
///
/// Pure: no I/O, no clock. Diagnoses are put into merge order (stable) before
/// merging, so callers may pass them in completion order.
pub fn synthesize(
    attempted: &[Modality],
    mut diagnoses: Vec<Diagnosis>,
    patient_info: PatientInfo,
) -> ComprehensiveReport {
    diagnoses.sort_by_key(|d| d.source);

    let mut analyses_performed = attempted.to_vec();
    analyses_performed.sort();
    analyses_performed.dedup();

    let mut urgency_level = UrgencyLevel::Low;
    let mut emergency_flags = Vec::new();
    for diagnosis in diagnoses.iter().filter(|d| d.emergency) {
        // Audio has no emergency message, so it can never raise urgency
        if let Some(message) = diagnosis.source.emergency_message() {
            urgency_level = UrgencyLevel::High;
            emergency_flags.push(message.to_string());
        }
    }

    let overall_confidence = mean_confidence(&diagnoses);
    let overall_assessment = match overall_confidence {
        None => ASSESSMENT_NO_CONCERNS,
        Some(mean) => assess(urgency_level, mean),
    }
    .to_string();

    let treatment_recommendations = merge_treatments(&diagnoses);

    debug!(
        diagnoses = diagnoses.len(),
        urgency = ?urgency_level,
        overall_confidence = ?overall_confidence,
        treatments = treatment_recommendations.len(),
        "Report synthesized"
    );

    ComprehensiveReport {
        patient_info,
        analyses_performed,
        primary_diagnoses: diagnoses,
        urgency_level,
        emergency_flags,
        overall_assessment,
        overall_confidence,
        treatment_recommendations,
    }
}

/// Arithmetic mean of all confidences (sum in merge order, divided by count)
fn mean_confidence(diagnoses: &[Diagnosis]) -> Option<Confidence> {
    if diagnoses.is_empty() {
        return None;
    }
    let sum: Confidence = diagnoses.iter().map(|d| d.confidence).sum();
    Some(sum / diagnoses.len() as Confidence)
}

/// Assessment text; urgency wins over confidence, thresholds are strict
fn assess(urgency: UrgencyLevel, mean: Confidence) -> &'static str {
    if urgency == UrgencyLevel::High {
        ASSESSMENT_URGENT
    } else if mean > HIGH_CONFIDENCE_THRESHOLD {
        ASSESSMENT_HIGH_CONFIDENCE
    } else if mean > MODERATE_CONFIDENCE_THRESHOLD {
        ASSESSMENT_MODERATE_CONFIDENCE
    } else {
        ASSESSMENT_LOW_CONFIDENCE
    }
}

fn merge_treatments(diagnoses: &[Diagnosis]) -> Vec<String> {
    let mut seen = HashSet::new();
    diagnoses
        .iter()
        .flat_map(|d| d.treatments.iter().map(String::as_str))
        .filter(|t| seen.insert(*t))
        .take(MAX_TREATMENT_RECOMMENDATIONS)
        .map(str::to_string)
        .collect()
}
