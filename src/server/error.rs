use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::models::{PropertyRecord, ValidationError};
use crate::orchestrator::OrchestrationError;
use crate::store::StoreError;

/// Failure classification surfaced to API callers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict {
        message: String,
        property: Option<Box<PropertyRecord>>,
    },
    /// The target site could not be scraped; the FAILED record can be retried
    #[error("{message}")]
    ScrapeFailed {
        message: String,
        property: Box<PropertyRecord>,
    },
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::ScrapeFailed { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });

        match self {
            ApiError::Conflict {
                property: Some(property),
                ..
            }
            | ApiError::ScrapeFailed { property, .. } => {
                body["property"] = json!(property);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", e.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::BadRequest("Property ID is required".to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound("Property not found".to_string()),
            StoreError::Duplicate { .. } => ApiError::Conflict {
                message: "Property with this URL already exists".to_string(),
                property: None,
            },
            other => {
                error!("Store failure: {}", other);
                ApiError::Internal(format!("Internal error: {}", other))
            }
        }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(e: OrchestrationError) -> Self {
        match e {
            OrchestrationError::InvalidUrl(message) => ApiError::BadRequest(message),
            OrchestrationError::NotFound(_) => ApiError::NotFound("Property not found".to_string()),
            OrchestrationError::InvalidState { .. } => ApiError::BadRequest(e.to_string()),
            OrchestrationError::ScrapeFailed { record, source } => {
                warn!(id = record.id, "Scrape failed: {}", source);
                ApiError::ScrapeFailed {
                    message: format!("Failed to scrape property data ({}); retry later", source),
                    property: record,
                }
            }
            OrchestrationError::Store(store) => store.into(),
        }
    }
}
