//! Analysis endpoints
//!
//! Predictor failures are not HTTP errors: they come back as
//! `status: "error"` prediction results with 200. HTTP errors are reserved
//! for malformed requests and for single-modality calls to a model that is
//! not loaded.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, Request, State,
    },
    http::header,
    routing::post,
    Json, RequestExt, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::coordinator::{AnalysisRequest, AnalysisResponse};
use crate::error::{ApiError, ApiResult};
use crate::predictors::ModalityInput;
use crate::types::{parse_age_str, parse_age_value, Modality, PatientInfo, PredictionResult};
use crate::AppState;

/// JSON body accepted by `/analyze/text` and `/analyze/comprehensive`
#[derive(Debug, Default, Deserialize)]
pub struct SymptomRequestBody {
    pub symptom_text: Option<String>,
    pub breed: Option<String>,
    /// Integer or numeric string; anything else is ignored
    pub age: Option<Value>,
    pub sex: Option<String>,
}

impl SymptomRequestBody {
    fn into_request(self) -> AnalysisRequest {
        AnalysisRequest {
            symptom_text: self.symptom_text,
            audio: None,
            image: None,
            patient: PatientInfo {
                breed: self.breed,
                age: self.age.as_ref().and_then(parse_age_value),
                sex: self.sex,
            },
        }
    }
}

/// Fields collected from a multipart form
#[derive(Debug, Default)]
struct FormFields {
    symptom_text: Option<String>,
    symptoms: Option<String>,
    breed: Option<String>,
    age: Option<String>,
    sex: Option<String>,
    audio: Option<Vec<u8>>,
    image: Option<Vec<u8>>,
}

impl FormFields {
    fn into_request(self) -> AnalysisRequest {
        AnalysisRequest {
            symptom_text: self.symptom_text,
            audio: self.audio,
            image: self.image,
            patient: PatientInfo {
                breed: self.breed,
                age: self.age.as_deref().and_then(parse_age_str),
                sex: self.sex,
            },
        }
    }
}

/// POST /analyze/text
pub async fn analyze_text(
    State(state): State<AppState>,
    payload: Result<Json<SymptomRequestBody>, JsonRejection>,
) -> ApiResult<Json<PredictionResult>> {
    let Json(body) =
        payload.map_err(|e| ApiError::BadRequest(format!("Invalid JSON payload: {}", e)))?;
    let request = body.into_request();

    let symptom_text = request
        .symptom_text()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("symptom_text is required".to_string()))?;

    let input = ModalityInput::Text {
        symptom_text,
        patient: request.patient,
    };
    run_single(&state, input).await
}

/// POST /analyze/audio (multipart: `audio`)
pub async fn analyze_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResult>> {
    let fields = read_form(multipart).await?;
    let bytes = fields
        .audio
        .ok_or_else(|| ApiError::BadRequest("No audio file provided".to_string()))?;

    run_single(&state, ModalityInput::Audio { bytes }).await
}

/// POST /analyze/image (multipart: `image`, optional `symptoms`)
pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResult>> {
    let fields = read_form(multipart).await?;
    let bytes = fields
        .image
        .ok_or_else(|| ApiError::BadRequest("No image file provided".to_string()))?;

    let input = ModalityInput::Image {
        bytes,
        symptoms: fields.symptoms,
    };
    run_single(&state, input).await
}

/// POST /analyze/comprehensive (multipart or JSON)
pub async fn analyze_comprehensive(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<AnalysisResponse>> {
    let request = parse_comprehensive_request(req).await?;
    request.ensure_inputs()?;

    let response = state.coordinator.analyze(request).await;
    for result in response.individual_results.iter() {
        record_failure(&state, result).await;
    }
    Ok(Json(response))
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze/text", post(analyze_text))
        .route("/analyze/audio", post(analyze_audio))
        .route("/analyze/image", post(analyze_image))
        .route("/analyze/comprehensive", post(analyze_comprehensive))
}

async fn run_single(state: &AppState, input: ModalityInput) -> ApiResult<Json<PredictionResult>> {
    let modality = input.modality();
    if !state.coordinator.registry().is_loaded(modality) {
        return Err(ApiError::ServiceUnavailable(format!(
            "{} model not loaded",
            modality
        )));
    }

    let result = state.coordinator.analyze_single(input).await;
    record_failure(state, &result).await;
    Ok(Json(result))
}

async fn record_failure(state: &AppState, result: &PredictionResult) {
    if let Some(error) = result.error.as_deref().filter(|_| !result.is_success()) {
        state
            .record_error(format!("{} analysis failed: {}", result.modality, error))
            .await;
    }
}

async fn parse_comprehensive_request(req: Request) -> ApiResult<AnalysisRequest> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") {
        let Json(body) = req
            .extract::<Json<SymptomRequestBody>, _>()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON payload: {}", e)))?;
        return Ok(body.into_request());
    }

    if content_type.starts_with("multipart/form-data") {
        let multipart = req.extract::<Multipart, _>().await;
        return Ok(read_form(multipart).await?.into_request());
    }

    Err(ApiError::UnsupportedMediaType(format!(
        "Expected application/json or multipart/form-data, got '{}'",
        content_type
    )))
}

async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> ApiResult<FormFields> {
    let mut multipart =
        multipart.map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?;

    let mut fields = FormFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed reading multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" | "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_field_error(&name, &e.to_string()))?;
                // An empty upload means "no file selected"
                if bytes.is_empty() {
                    continue;
                }
                if name == "audio" {
                    fields.audio = Some(bytes.to_vec());
                } else {
                    fields.image = Some(bytes.to_vec());
                }
            }
            "symptom_text" | "symptoms" | "breed" | "age" | "sex" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_field_error(&name, &e.to_string()))?;
                if text.trim().is_empty() {
                    continue;
                }
                let slot = match name.as_str() {
                    "symptom_text" => &mut fields.symptom_text,
                    "symptoms" => &mut fields.symptoms,
                    "breed" => &mut fields.breed,
                    "age" => &mut fields.age,
                    _ => &mut fields.sex,
                };
                *slot = Some(text);
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(fields)
}

fn multipart_field_error(name: &str, error: &str) -> ApiError {
    ApiError::BadRequest(format!("Failed reading multipart '{}' field: {}", name, error))
}
