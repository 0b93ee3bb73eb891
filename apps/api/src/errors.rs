use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fatal outcomes of the extraction pipeline and the migrator.
/// Recoverable deviations never surface here; they travel as issue strings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// No balanced JSON object could be located in the model output.
    #[error("payload not parsable: {snippet}")]
    UnparsablePayload { snippet: String },

    /// Validation still failed after repair and pruning. Indicates a logic defect.
    #[error("payload not recoverable: {} schema violation(s) survived pruning", .issues.len())]
    UnrecoverableSchema { issues: Vec<String> },

    /// A persisted snapshot is newer than this build understands.
    #[error("schema version {found} is newer than supported version {current}")]
    FutureSchemaVersion { found: u32, current: u32 },
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            AppError::Pipeline(PipelineError::UnparsablePayload { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPARSABLE_PAYLOAD",
                self.to_string(),
            ),
            AppError::Pipeline(PipelineError::FutureSchemaVersion { .. }) => (
                StatusCode::CONFLICT,
                "FUTURE_SCHEMA_VERSION",
                self.to_string(),
            ),
            AppError::Pipeline(PipelineError::UnrecoverableSchema { issues }) => {
                tracing::error!("Schema defect: {self}; surviving issues: {issues:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SCHEMA_DEFECT",
                    "The payload could not be brought into schema".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
