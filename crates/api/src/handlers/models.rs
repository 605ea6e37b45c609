//! Handler for backend model-file listings.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Model listing payload.
#[derive(Debug, Serialize)]
pub struct ModelList {
    /// The queried folder (`loras`, `diffusion_models`, `vae`,
    /// `text_encoders`).
    pub kind: String,
    pub models: Vec<String>,
}

/// GET /api/v1/models/{kind}
///
/// Proxies the backend's `/models/{folder}` listing. The folder name is
/// validated against the known set before any backend call.
pub async fn list_models(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    let models = state.generator.list_models(&kind).await?;
    Ok(Json(DataResponse {
        data: ModelList { kind, models },
    }))
}
