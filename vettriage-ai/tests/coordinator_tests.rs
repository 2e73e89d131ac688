//! Request coordinator integration tests
//!
//! Fault isolation, timeouts, merge ordering and per-modality serialization.

mod helpers;

use helpers::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vettriage_ai::coordinator::{AnalysisRequest, Coordinator};
use vettriage_ai::fusion::{UrgencyLevel, ASSESSMENT_NO_CONCERNS};
use vettriage_ai::predictors::{ModalityInput, Predictor};
use vettriage_ai::registry::ModelRegistry;
use vettriage_ai::types::{Modality, PatientInfo, PredictionStatus};

fn full_request() -> AnalysisRequest {
    AnalysisRequest {
        symptom_text: Some("vomiting and lethargy".to_string()),
        audio: Some(vec![0x52, 0x49, 0x46, 0x46]),
        image: Some(vec![0xFF, 0xD8, 0xFF]),
        patient: PatientInfo {
            breed: Some("Labrador".to_string()),
            age: Some(4),
            sex: Some("male".to_string()),
        },
    }
}

#[tokio::test]
async fn test_failure_in_one_modality_is_isolated() {
    let text = Arc::new(ScriptedPredictor::responding(
        Modality::Text,
        text_payload("Gastroenteritis", 0.8, &["Bland diet"], false),
    ));
    let audio = Arc::new(ScriptedPredictor::failing(Modality::Audio, "decoder crashed"));
    let image = Arc::new(ScriptedPredictor::responding(
        Modality::Image,
        image_payload("Dehydration", 0.6, &["Fluids"], false),
    ));
    let coordinator = coordinator_of(vec![text, audio, image], Duration::from_secs(5));

    let response = coordinator.analyze(full_request()).await;
    let report = &response.comprehensive_report;

    assert_eq!(response.status, "success");
    let audio_result = response.individual_results.audio_analysis.as_ref().unwrap();
    assert_eq!(audio_result.status, PredictionStatus::Error);
    assert_eq!(audio_result.error.as_deref(), Some("Model error: decoder crashed"));

    assert_eq!(report.analyses_performed, Modality::ALL.to_vec());
    assert_eq!(report.primary_diagnoses.len(), 2);
    assert_eq!(report.primary_diagnoses[0].source, Modality::Text);
    assert_eq!(report.primary_diagnoses[1].source, Modality::Image);
    assert!((report.overall_confidence.unwrap() - 0.7).abs() < 1e-9);
    assert_eq!(report.treatment_recommendations, vec!["Bland diet", "Fluids"]);
}

#[tokio::test]
async fn test_all_modalities_failing_still_returns_report() {
    let coordinator = coordinator_of(
        vec![
            Arc::new(ScriptedPredictor::failing(Modality::Text, "offline")),
            Arc::new(ScriptedPredictor::failing(Modality::Audio, "offline")),
            Arc::new(ScriptedPredictor::failing(Modality::Image, "offline")),
        ],
        Duration::from_secs(5),
    );

    let response = coordinator.analyze(full_request()).await;
    let report = &response.comprehensive_report;

    assert_eq!(report.analyses_performed, Modality::ALL.to_vec());
    assert!(report.primary_diagnoses.is_empty());
    assert_eq!(report.urgency_level, UrgencyLevel::Low);
    assert_eq!(report.overall_assessment, ASSESSMENT_NO_CONCERNS);
    assert!(report.overall_confidence.is_none());
    assert_eq!(response.individual_results.iter().count(), 3);
}

#[tokio::test]
async fn test_panicking_predictor_becomes_failure() {
    let coordinator = coordinator_of(
        vec![
            Arc::new(ScriptedPredictor::panicking(Modality::Image)),
            Arc::new(ScriptedPredictor::responding(
                Modality::Text,
                text_payload("Otitis", 0.9, &[], false),
            )),
        ],
        Duration::from_secs(5),
    );

    let response = coordinator
        .analyze(AnalysisRequest {
            symptom_text: Some("head tilt".to_string()),
            image: Some(vec![1, 2, 3]),
            ..Default::default()
        })
        .await;

    let image = response.individual_results.image_analysis.as_ref().unwrap();
    assert!(!image.is_success());
    assert!(image
        .error
        .as_deref()
        .unwrap()
        .starts_with("Prediction task failed"));
    assert_eq!(response.comprehensive_report.primary_diagnoses.len(), 1);
}

#[tokio::test]
async fn test_slow_modality_times_out_without_blocking_others() {
    let text = Arc::new(ScriptedPredictor::responding(
        Modality::Text,
        text_payload("Otitis", 0.9, &[], false),
    ));
    let audio = Arc::new(
        ScriptedPredictor::responding(Modality::Audio, audio_payload("Kennel cough", 0.9))
            .with_delay(Duration::from_secs(10)),
    );
    let coordinator = coordinator_of(vec![text, audio], Duration::from_millis(100));

    let started = Instant::now();
    let response = coordinator
        .analyze(AnalysisRequest {
            symptom_text: Some("coughing".to_string()),
            audio: Some(vec![1]),
            ..Default::default()
        })
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    let audio_result = response.individual_results.audio_analysis.as_ref().unwrap();
    assert_eq!(
        audio_result.error.as_deref(),
        Some("Prediction timed out after 100ms")
    );
    assert!(response.individual_results.text_analysis.as_ref().unwrap().is_success());
}

#[tokio::test]
async fn test_merge_order_independent_of_completion_order() {
    // Image finishes first, text last
    let text = Arc::new(
        ScriptedPredictor::responding(
            Modality::Text,
            text_payload("Parvovirus", 0.9, &["IV fluids", "Isolation"], true),
        )
        .with_delay(Duration::from_millis(150)),
    );
    let audio = Arc::new(
        ScriptedPredictor::responding(Modality::Audio, audio_payload("Wheezing", 0.5))
            .with_delay(Duration::from_millis(75)),
    );
    let image = Arc::new(ScriptedPredictor::responding(
        Modality::Image,
        image_payload("Wound", 0.7, &["Isolation", "Clean wound"], true),
    ));
    let coordinator = coordinator_of(vec![text, audio, image], Duration::from_secs(5));

    let report = coordinator.analyze(full_request()).await.comprehensive_report;

    let sources: Vec<Modality> = report.primary_diagnoses.iter().map(|d| d.source).collect();
    assert_eq!(sources, Modality::ALL.to_vec());
    assert_eq!(
        report.emergency_flags,
        vec![
            "Text symptoms indicate urgent care needed",
            "Image analysis indicates emergency condition"
        ]
    );
    assert_eq!(
        report.treatment_recommendations,
        vec!["IV fluids", "Isolation", "Clean wound"]
    );
    assert_eq!(report.urgency_level, UrgencyLevel::High);
}

#[tokio::test]
async fn test_modalities_run_concurrently() {
    let delay = Duration::from_millis(300);
    let coordinator = coordinator_of(
        vec![
            Arc::new(
                ScriptedPredictor::responding(Modality::Text, text_payload("A", 0.5, &[], false))
                    .with_delay(delay),
            ),
            Arc::new(
                ScriptedPredictor::responding(Modality::Audio, audio_payload("B", 0.5))
                    .with_delay(delay),
            ),
            Arc::new(
                ScriptedPredictor::responding(Modality::Image, image_payload("C", 0.5, &[], false))
                    .with_delay(delay),
            ),
        ],
        Duration::from_secs(5),
    );

    let started = Instant::now();
    coordinator.analyze(full_request()).await;
    assert!(started.elapsed() < delay * 3);
}

#[tokio::test]
async fn test_non_reentrant_predictor_is_serialized() {
    let text = Arc::new(
        ScriptedPredictor::responding(Modality::Text, text_payload("Otitis", 0.6, &[], false))
            .with_delay(Duration::from_millis(50))
            .non_reentrant(),
    );
    let coordinator = Arc::new(coordinator_of(vec![text.clone()], Duration::from_secs(5)));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .analyze_single(ModalityInput::Text {
                        symptom_text: format!("case {}", i),
                        patient: PatientInfo::default(),
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_success());
    }
    assert_eq!(text.call_count(), 4);
    assert_eq!(text.max_in_flight(), 1);
}

#[tokio::test]
async fn test_image_predictor_receives_symptom_text() {
    let image = Arc::new(ScriptedPredictor::responding(
        Modality::Image,
        image_payload("Rash", 0.6, &[], false),
    ));
    let coordinator = coordinator_of(vec![image.clone()], Duration::from_secs(5));

    coordinator
        .analyze(AnalysisRequest {
            symptom_text: Some("red itchy belly".to_string()),
            image: Some(vec![9, 9, 9]),
            ..Default::default()
        })
        .await;

    match image.last_input() {
        Some(ModalityInput::Image { bytes, symptoms }) => {
            assert_eq!(bytes, vec![9, 9, 9]);
            assert_eq!(symptoms.as_deref(), Some("red itchy belly"));
        }
        other => panic!("unexpected input: {:?}", other),
    }
}

#[tokio::test]
async fn test_patient_info_passes_through() {
    let coordinator = coordinator_of(vec![], Duration::from_secs(5));
    let response = coordinator.analyze(full_request()).await;
    assert_eq!(response.comprehensive_report.patient_info, full_request().patient);
}

#[tokio::test]
async fn test_serialized_registration_of_reentrant_predictor() {
    let audio = Arc::new(
        ScriptedPredictor::responding(Modality::Audio, audio_payload("Kennel cough", 0.7))
            .with_delay(Duration::from_millis(50)),
    );
    let registry = ModelRegistry::builder()
        .register_serialized(audio.clone() as Arc<dyn Predictor>)
        .build();
    let coordinator = Arc::new(Coordinator::new(Arc::new(registry), Duration::from_secs(5)));

    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .analyze(AnalysisRequest {
                        audio: Some(vec![i + 1; 8]),
                        ..Default::default()
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response
            .individual_results
            .audio_analysis
            .as_ref()
            .unwrap()
            .is_success());
    }
    assert_eq!(audio.call_count(), 4);
    assert_eq!(audio.max_in_flight(), 1);
}

#[tokio::test]
async fn test_only_present_modalities_run() {
    let text = Arc::new(ScriptedPredictor::responding(
        Modality::Text,
        text_payload("Otitis", 0.6, &[], false),
    ));
    let audio = Arc::new(ScriptedPredictor::responding(
        Modality::Audio,
        audio_payload("Wheezing", 0.4),
    ));
    let coordinator = coordinator_of(vec![text, audio.clone()], Duration::from_secs(5));

    let response = coordinator
        .analyze(AnalysisRequest {
            symptom_text: Some("head shaking".to_string()),
            ..Default::default()
        })
        .await;

    assert_eq!(audio.call_count(), 0);
    assert!(response.individual_results.audio_analysis.is_none());
    assert_eq!(
        response.comprehensive_report.analyses_performed,
        vec![Modality::Text]
    );
    assert_eq!(response.comprehensive_report.overall_confidence, Some(0.6));
}

#[tokio::test]
async fn test_single_modality_timeout_is_a_failed_prediction() {
    let text = Arc::new(
        ScriptedPredictor::responding(Modality::Text, text_payload("Otitis", 0.6, &[], false))
            .with_delay(Duration::from_secs(5)),
    );
    let coordinator = coordinator_of(vec![text], Duration::from_millis(50));

    let result = coordinator
        .analyze_single(ModalityInput::Text {
            symptom_text: "lethargy".to_string(),
            patient: PatientInfo::default(),
        })
        .await;

    assert!(!result.is_success());
    assert_eq!(result.error.as_deref(), Some("Prediction timed out after 50ms"));
}
