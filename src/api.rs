use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::advisory::{AdvisoryClient, ADVISORY_PLACEHOLDER};
use crate::classifier::{Classifier, Label};
use crate::error::ApiError;
use crate::store::{MonitoringPoint, WaterPointStore};
use crate::summary::{CommunityRecord, SummaryGenerator};

/// Shared service context. The classifier and advisory client are optional
/// capabilities: a failed startup initialization leaves them None for the
/// life of the process and the corresponding endpoints answer 503.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Option<Arc<Classifier>>,
    pub advisory: Option<Arc<AdvisoryClient>>,
    pub store: WaterPointStore,
    pub summary: SummaryGenerator,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: Confidence,
    pub gemini_advice: String,
    pub alert_message: Option<String>,
}

#[derive(Serialize)]
pub struct Confidence {
    #[serde(rename = "Potable")]
    pub potable: f64,
    #[serde(rename = "Not Potable")]
    pub not_potable: f64,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/water_points", get(get_water_points))
        .route("/predict", post(predict))
        .route("/analyze_image", post(analyze_image))
        .route("/api/community_summary", get(get_community_summary))
        .with_state(state)
}

async fn home() -> &'static str {
    "AquaLERT Backend is running."
}

#[instrument(skip(state))]
async fn get_water_points(State(state): State<AppState>) -> Json<Vec<MonitoringPoint>> {
    let points = state.store.snapshot();
    debug!("Serving {} monitoring points", points.len());
    Json(points)
}

#[instrument(skip(state, body))]
async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let classifier = state.classifier.as_ref().ok_or_else(|| {
        warn!("Predict request while no model is loaded");
        ApiError::ModelUnavailable
    })?;

    let Json(body) = body.map_err(|rejection| {
        warn!("Rejected predict body: {}", rejection.body_text());
        ApiError::InvalidInput(rejection.body_text())
    })?;
    let sample = body
        .as_object()
        .ok_or_else(|| ApiError::InvalidInput("Request body must be a JSON object".to_string()))?;

    let result = classifier.classify(sample)?;
    debug!(
        "Prediction: {} ({:.2}% confident)",
        result.label.as_str(),
        result.confidence_pct()
    );

    let mut alert_message = None;
    if result.label == Label::NotPotable {
        if let (Some(lat), Some(lon)) = (coordinate(sample, "lat"), coordinate(sample, "lon")) {
            alert_message = state.store.raise_proximity_alert(lat, lon);
            if alert_message.is_some() {
                info!("Proximity alert raised for sample at ({}, {})", lat, lon);
            }
        } else {
            debug!("Sample has no usable coordinates, skipping proximity check");
        }
    }

    let gemini_advice = match &state.advisory {
        Some(client) => {
            client
                .advise(result.label.as_str(), result.confidence_pct(), sample)
                .await?
        }
        None => ADVISORY_PLACEHOLDER.to_string(),
    };

    info!(
        "Classified sample as {} (alert: {})",
        result.label.as_str(),
        alert_message.is_some()
    );

    Ok(Json(PredictResponse {
        prediction: result.label.as_str().to_string(),
        confidence: Confidence {
            potable: round2(result.probabilities[1] * 100.0),
            not_potable: round2(result.probabilities[0] * 100.0),
        },
        gemini_advice,
        alert_message,
    }))
}

#[instrument(skip(state, body))]
async fn analyze_image(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let advisory = state.advisory.as_ref().ok_or_else(|| {
        warn!("Image analysis request while no vision client is configured");
        ApiError::AdvisoryUnavailable
    })?;

    let Json(body) = body.map_err(|rejection| {
        warn!("Rejected analyze_image body: {}", rejection.body_text());
        ApiError::InvalidInput(rejection.body_text())
    })?;
    let data_url = body
        .get("image")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::InvalidInput("No image data provided.".to_string()))?;

    let (mime_type, image) = decode_data_url(data_url)?;
    debug!("Decoded {} byte {} image", image.len(), mime_type);

    let analysis = advisory
        .assess_image(&image, &mime_type)
        .await
        .map_err(|e| {
            error!("Visual analysis failed: {}", e);
            ApiError::Vision(e)
        })?;

    info!("Visual analysis complete, {} bytes of markdown", analysis.len());
    Ok(Json(AnalysisResponse { analysis }))
}

#[instrument(skip(state))]
async fn get_community_summary(
    State(state): State<AppState>,
) -> (StatusCode, Json<Vec<CommunityRecord>>) {
    let records = state.summary.generate();
    debug!("Generated {} synthetic summary records", records.len());
    (StatusCode::OK, Json(records))
}

/// Optional coordinate from the sample body. Accepts JSON numbers and
/// numeric strings; anything else counts as absent so the proximity check
/// is skipped rather than failing the request.
fn coordinate(sample: &Map<String, Value>, key: &str) -> Option<f64> {
    match sample.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Split a `data:<mime>;base64,<payload>` URL into mime type and raw bytes.
/// Bare base64 without the prefix is accepted and treated as JPEG.
fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), ApiError> {
    let (header, payload) = match data_url.split_once(',') {
        Some((header, payload)) => (header, payload),
        None => ("", data_url),
    };

    let mime_type = header
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .unwrap_or("image/jpeg")
        .to_string();

    let image = BASE64
        .decode(payload.trim())
        .map_err(|e| ApiError::InvalidInput(format!("Invalid base64 image data: {}", e)))?;

    Ok((mime_type, image))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
