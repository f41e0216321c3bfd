use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::controller::ServiceError;
use crate::error::ForecastError;

/// API error types that can be returned from handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error response that gets serialized to JSON
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Unprocessable(_) => "Unprocessable",
            ApiError::InternalError(_) => "InternalServerError",
        }
    }

    /// Hint for the client on how to recover
    fn details(&self) -> Option<String> {
        match self {
            ApiError::Conflict(_) => Some("Train the zone's model first".to_string()),
            ApiError::Unprocessable(_) => Some("Upload a longer price history".to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let details = self.details();

        let message = match &self {
            ApiError::InternalError(_) => {
                tracing::error!(error = %self, "API error occurred");
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
                self.to_string()
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

// Conversion from common error types

impl From<ForecastError> for ApiError {
    fn from(error: ForecastError) -> Self {
        match error {
            ForecastError::ModelNotTrained => ApiError::Conflict(error.to_string()),
            ForecastError::InsufficientData { .. } => ApiError::Unprocessable(error.to_string()),
            ForecastError::InvalidWindow { .. }
            | ForecastError::NonFiniteValue { .. }
            | ForecastError::UnorderedSeries { .. } => ApiError::BadRequest(error.to_string()),
            ForecastError::CheckpointCorrupt { .. }
            | ForecastError::CheckpointIo { .. }
            | ForecastError::TrainingDiverged { .. } => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::UnknownZone(_) | ServiceError::NoForecast(_) => {
                ApiError::NotFound(error.to_string())
            }
            ServiceError::NoPriceData(_) => ApiError::Unprocessable(error.to_string()),
            ServiceError::Forecast(inner) => inner.into(),
            ServiceError::Worker(_) => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}
