use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use anima_core::error::CoreError;
use anima_pipeline::error::GenerateError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`GenerateError`] for domain errors and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `anima_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A pipeline error from `anima_pipeline`.
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// A referenced resource does not exist.
    #[error("{what} '{reference}' not found")]
    NotFound {
        what: &'static str,
        reference: String,
    },

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, last_status) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Generate(err) => match err {
                GenerateError::Core(core) => classify_core_error(core),
                GenerateError::Submission(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "SUBMISSION_FAILED",
                    format!("ComfyUI returned no usable job handle: {msg}"),
                    None,
                ),
                GenerateError::Timeout {
                    prompt_id,
                    last_status,
                } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "GENERATION_TIMEOUT",
                    format!("Timed out waiting for prompt {prompt_id} to complete"),
                    last_status.clone(),
                ),
                GenerateError::Transport(e) => (
                    StatusCode::BAD_GATEWAY,
                    "BACKEND_ERROR",
                    e.to_string(),
                    None,
                ),
                GenerateError::Io(e) => {
                    tracing::error!(error = %e, "Artifact persistence error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            },

            AppError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string(), None)
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        // Timeout diagnostics: the last observed (incomplete) status.
        if let Some(last) = last_status {
            body["last_status"] = last;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Map a [`CoreError`] to an HTTP status, error code, and message.
fn classify_core_error(
    core: &CoreError,
) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
    match core {
        CoreError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            msg.clone(),
            None,
        ),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            )
        }
    }
}
