//! Handlers for generation and reroll.
//!
//! Routes:
//! - `POST /generate` — run a generation request (repeat-aware)
//! - `POST /reroll`   — re-run a recorded request with overrides

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use anima_core::params::GenerationParams;
use anima_pipeline::generator::RunResult;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/v1/generate
///
/// The body is the generation parameter record itself. With `repeat` of 1
/// (the default) the bare result object is returned; with more, a
/// `{ success, results }` envelope carrying one entry per iteration —
/// failed iterations are reported in place without aborting the rest.
pub async fn generate(
    State(state): State<AppState>,
    Json(params): Json<GenerationParams>,
) -> AppResult<impl IntoResponse> {
    let runs = state.generator.generate_batch(params).await?;
    Ok(Json(runs_to_response(runs)?))
}

/// POST /api/v1/reroll request body.
#[derive(Debug, Deserialize)]
pub struct RerollRequest {
    /// History reference: `"last"`, an id, or `"#id"`.
    pub source: String,
    /// Parameter overrides applied on top of the stored record.
    #[serde(default)]
    pub overrides: GenerationParams,
}

/// POST /api/v1/reroll
///
/// Resolves the history reference, merges overrides (fresh random seed
/// unless pinned), and runs the merged request. An unknown reference is an
/// explicit 404 — never a silently substituted record.
pub async fn reroll(
    State(state): State<AppState>,
    Json(input): Json<RerollRequest>,
) -> AppResult<impl IntoResponse> {
    let runs = state
        .generator
        .reroll(&input.source, &input.overrides)
        .await?
        .ok_or_else(|| AppError::NotFound {
            what: "History record",
            reference: input.source.clone(),
        })?;
    Ok(Json(runs_to_response(runs)?))
}

/// Convert the repeat loop's outcomes into the response payload.
///
/// A single failed run surfaces as a proper HTTP error; mixed multi-run
/// outcomes are reported per-iteration in a 200 response.
fn runs_to_response(mut runs: Vec<RunResult>) -> Result<Value, AppError> {
    if runs.len() == 1 {
        let run = runs.remove(0);
        let result = run.outcome?;
        return serde_json::to_value(result)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize result: {e}")));
    }

    let any_success = runs.iter().any(|r| r.outcome.is_ok());
    let mut results = Vec::with_capacity(runs.len());
    for run in runs {
        match run.outcome {
            Ok(result) => results.push(serde_json::to_value(result).map_err(|e| {
                AppError::InternalError(format!("Failed to serialize result: {e}"))
            })?),
            Err(error) => results.push(json!({
                "success": false,
                "run": run.run,
                "error": error.to_string(),
            })),
        }
    }

    Ok(json!({
        "success": any_success,
        "results": results,
    }))
}
