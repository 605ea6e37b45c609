//! Error taxonomy for the generation pipeline.

use anima_core::error::CoreError;
use anima_comfyui::api::ComfyUIApiError;

/// Fatal outcomes of a single generation run.
///
/// `Core` (validation) is raised before any network traffic; the other
/// variants map one-to-one onto the protocol phases. None of them trigger
/// automatic retries.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Domain validation failure, rejected before submission.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backend accepted the connection but returned no usable handle.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Poll deadline exceeded before the backend reported completion.
    /// Carries the last observed status envelope for diagnostics.
    #[error("Timed out waiting for prompt {prompt_id} to complete")]
    Timeout {
        prompt_id: String,
        last_status: Option<serde_json::Value>,
    },

    /// Transport-level failure (connection, decode, non-2xx), surfaced
    /// verbatim.
    #[error(transparent)]
    Transport(#[from] ComfyUIApiError),

    /// Local artifact persistence failed.
    #[error("Failed to persist artifact: {0}")]
    Io(#[from] std::io::Error),
}
