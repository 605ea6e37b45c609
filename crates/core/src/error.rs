/// Domain-level errors shared across the workspace.
///
/// `Validation` covers everything rejected before a job reaches the
/// network: malformed aspect ratios, missing required fields, bad artist
/// markers, unknown model folders.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
