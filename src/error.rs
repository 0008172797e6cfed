use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::advisory::AdvisoryError;
use crate::classifier::ClassifierError;

/// Handler-boundary error. Every failure a request can hit is converted into
/// one of these and rendered as an `{"error": ...}` JSON body, so a bad
/// request can never take the process down.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Prediction model is not loaded")]
    ModelUnavailable,
    #[error("Vision model not available.")]
    AdvisoryUnavailable,
    #[error("{0}")]
    InvalidInput(String),
    /// Advisory failure on the predict path. Request-fatal with a generic
    /// message, matching the original backend's broad handler.
    #[error("An error occurred: {0}")]
    Advisory(#[from] AdvisoryError),
    /// Advisory failure on the image path.
    #[error("Error during visual analysis: {0}")]
    Vision(AdvisoryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ModelUnavailable | ApiError::AdvisoryUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::InvalidInput(_) | ApiError::Advisory(_) => StatusCode::BAD_REQUEST,
            ApiError::Vision(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
