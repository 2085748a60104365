//! Unified API error handling
//!
//! All handlers return `Result<_, ApiError>`; the wire shape of every error
//! is `{"detail": "<message>"}`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::StoreError;
use crate::model::ValidationError;
use crate::service::analysis::AnalysisError;
use crate::service::resolver::ResolutionError;
use crate::service::workflow::WorkflowError;

/// Standard error response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub detail: String,
}

/// Unified API error type
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Malformed or inconsistent request fields (400)
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Unknown job id (404)
    #[error("Request {0} not found")]
    JobNotFound(Uuid),

    /// Pipeline or response-building failure (500)
    #[error("{0}")]
    Analysis(String),

    /// Job store failure (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Upstream collaborator unreachable or misbehaving (502)
    #[error("External service error: {0}")]
    ExternalService(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::JobNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Analysis(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        tracing::error!(
            status = status.as_u16(),
            message = %self,
            "API error"
        );

        HttpResponse::build(status).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Validation(e) => ApiError::Validation(e),
            AnalysisError::Resolution(ResolutionError::KnowledgeGraph(e)) => {
                ApiError::ExternalService(e.to_string())
            }
            AnalysisError::Workflow(WorkflowError::HttpError(e)) => {
                ApiError::ExternalService(e.to_string())
            }
            other => ApiError::Analysis(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::JobNotFound(id),
            other => ApiError::Storage(other.to_string()),
        }
    }
}
