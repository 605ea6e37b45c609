//! Shared response envelope types for API handlers.
//!
//! Listing endpoints use a `{ "data": ... }` envelope; the generation
//! endpoints return the pipeline's result shape directly for
//! compatibility with existing callers.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
