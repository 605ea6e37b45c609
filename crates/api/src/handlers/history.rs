//! Handler for history listings.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use anima_core::params::GenerationParams;
use anima_core::types::{HistoryId, Timestamp};
use anima_pipeline::history::DEFAULT_LIST_LIMIT;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/history query parameters.
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    /// Number of records to return, newest first (default 5).
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,
}

/// One history listing entry.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub created_at: Timestamp,
    pub summary: String,
    pub params: GenerationParams,
}

/// GET /api/v1/history
///
/// Returns the most recent submissions, newest first, with one-line
/// summaries for picking a reroll source.
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT as u32) as usize;
    let records = state.generator.history().list_recent(limit).await;

    let records: Vec<HistoryEntry> = records
        .into_iter()
        .map(|record| HistoryEntry {
            summary: record.summary(),
            id: record.id,
            created_at: record.created_at,
            params: record.params,
        })
        .collect();

    Ok(Json(DataResponse {
        data: serde_json::json!({
            "count": records.len(),
            "records": records,
        }),
    }))
}
