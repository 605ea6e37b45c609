//! End-to-end generation orchestration.
//!
//! One [`Generator`] drives the whole protocol per job: inject the
//! parameter record into the workflow template, submit it, poll the
//! backend's history endpoint until the job completes or the deadline
//! passes, fetch and materialize every artifact, and record the submission
//! in the history ledger.

use std::time::{Duration, Instant};

use serde_json::Value;

use anima_comfyui::api::{validate_model_folder, ComfyUIApi, ComfyUIApiError};
use anima_comfyui::workflow;
use anima_core::params::{merge_for_reroll, validate_request, GenerationParams};
use anima_core::prompt::compose_positive_text;
use anima_core::resolution::resolve_dimensions;
use anima_core::types::HistoryId;

use crate::artifacts::{extract_artifacts, materialize, ArtifactOutput};
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::history::HistoryLedger;

/// Result of one completed generation run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationResult {
    pub success: bool,
    /// Backend job handle.
    pub prompt_id: String,
    /// Final text slots actually sent.
    pub positive: String,
    pub negative: String,
    /// Final resolved dimensions.
    pub width: u32,
    pub height: u32,
    /// Ledger id of the appended record, usable as a reroll source.
    pub history_id: HistoryId,
    pub images: Vec<ArtifactOutput>,
}

/// Outcome of one iteration of the repeat loop.
#[derive(Debug)]
pub struct RunResult {
    /// 1-based iteration index.
    pub run: u32,
    pub outcome: Result<GenerationResult, GenerateError>,
}

/// Inputs shared by every iteration of a request: dimensions are resolved
/// and texts composed once, seeds vary per run.
struct RunPlan {
    width: u32,
    height: u32,
    positive: String,
    negative: String,
}

/// Orchestrates generation jobs against one ComfyUI instance.
pub struct Generator {
    api: ComfyUIApi,
    config: GeneratorConfig,
    history: HistoryLedger,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ComfyUIApiError> {
        let api = ComfyUIApi::new(
            &config.comfyui_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self {
            api,
            config,
            history: HistoryLedger::new(),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// List model files for one backend folder.
    pub async fn list_models(&self, folder: &str) -> Result<Vec<String>, GenerateError> {
        validate_model_folder(folder)?;
        Ok(self.api.list_models(folder).await?)
    }

    /// Run a single validated generation end-to-end.
    pub async fn generate(
        &self,
        params: &GenerationParams,
    ) -> Result<GenerationResult, GenerateError> {
        validate_request(params)?;
        let plan = self.plan(params)?;
        self.run_once(params, &plan).await
    }

    /// Run a request's full repeat loop.
    ///
    /// Validation happens once, before any iteration — a structurally
    /// unusable request never reaches the network. After that, each
    /// iteration is independent: a failed run is recorded in its
    /// [`RunResult`] and the remaining iterations still execute. Unless the
    /// caller pinned a seed, every iteration draws a fresh one at
    /// injection time.
    pub async fn generate_batch(
        &self,
        params: GenerationParams,
    ) -> Result<Vec<RunResult>, GenerateError> {
        validate_request(&params)?;
        let plan = self.plan(&params)?;

        let repeat = params.repeat_count();
        let mut runs = Vec::with_capacity(repeat as usize);
        for run in 1..=repeat {
            let mut run_params = params.clone();
            // Each ledger record describes a single submission.
            run_params.repeat = None;

            let outcome = self.run_once(&run_params, &plan).await;
            if let Err(error) = &outcome {
                tracing::warn!(run, repeat, error = %error, "Generation run failed");
            }
            runs.push(RunResult { run, outcome });
        }
        Ok(runs)
    }

    /// Re-submit a recorded request with selective overrides.
    ///
    /// Returns `Ok(None)` when the reference does not resolve — an
    /// expected outcome the caller must surface, never silently swapped
    /// for a different record. The merged record drops the stored seed
    /// unless the override pinned one, so rerolls vary by default.
    pub async fn reroll(
        &self,
        source: &str,
        overrides: &GenerationParams,
    ) -> Result<Option<Vec<RunResult>>, GenerateError> {
        let Some(record) = self.history.get(source).await else {
            tracing::info!(source, "Reroll reference not found");
            return Ok(None);
        };
        let merged = merge_for_reroll(&record.params, overrides)?;
        tracing::info!(source, history_id = record.id, "Rerolling from history");
        self.generate_batch(merged).await.map(Some)
    }

    // ---- internals ----

    /// Resolve dimensions and compose the final text slots.
    fn plan(&self, params: &GenerationParams) -> Result<RunPlan, GenerateError> {
        let round_to = params.round_to.filter(|r| *r > 0).unwrap_or(self.config.round_to);
        let target_megapixels = params
            .target_megapixels
            .filter(|m| *m > 0.0)
            .unwrap_or(self.config.target_megapixels);

        let (width, height) = resolve_dimensions(
            params.aspect_ratio.as_deref(),
            target_megapixels,
            params.width,
            params.height,
            round_to,
        )?;

        let positive = match params.positive_override() {
            Some(text) => text.to_string(),
            None => compose_positive_text(params),
        };
        let negative = params.neg.as_deref().map(str::trim).unwrap_or("").to_string();

        Ok(RunPlan {
            width,
            height,
            positive,
            negative,
        })
    }

    /// Inject, submit, wait, fetch, materialize, record. One job.
    async fn run_once(
        &self,
        params: &GenerationParams,
        plan: &RunPlan,
    ) -> Result<GenerationResult, GenerateError> {
        let graph = workflow::inject(params, plan.width, plan.height, &plan.positive, &plan.negative);

        let submit = match self.api.submit_workflow(&graph).await {
            Ok(response) => response,
            Err(ComfyUIApiError::MissingPromptId { body }) => {
                return Err(GenerateError::Submission(body));
            }
            Err(e) => return Err(e.into()),
        };
        let prompt_id = submit.prompt_id;
        tracing::info!(
            prompt_id = %prompt_id,
            width = plan.width,
            height = plan.height,
            "Job queued",
        );

        let history_item = self.wait_for_completion(&prompt_id).await?;

        let refs = extract_artifacts(&self.api, &history_item)?;
        let mut images = Vec::with_capacity(refs.len());
        for artifact in &refs {
            images.push(materialize(&self.api, &self.config, artifact).await?);
        }

        let history_id = self.history.append(params.clone()).await;
        tracing::info!(
            prompt_id = %prompt_id,
            history_id,
            images = images.len(),
            "Generation complete",
        );

        Ok(GenerationResult {
            success: true,
            prompt_id,
            positive: plan.positive.clone(),
            negative: plan.negative.clone(),
            width: plan.width,
            height: plan.height,
            history_id,
            images,
        })
    }

    /// Poll the history endpoint until the prompt's entry appears.
    ///
    /// Fixed sleep between polls, absolute deadline measured from loop
    /// start. On expiry the last observed (incomplete) envelope rides
    /// along in the timeout error for diagnostics.
    async fn wait_for_completion(&self, prompt_id: &str) -> Result<Value, GenerateError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.generation_timeout_secs);
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut last_status: Option<Value> = None;

        loop {
            let envelope = self.api.get_history(prompt_id).await?;
            if let Some(item) = envelope.get(prompt_id) {
                return Ok(item.clone());
            }
            last_status = Some(envelope);

            if Instant::now() >= deadline {
                tracing::warn!(prompt_id = %prompt_id, "Poll deadline exceeded");
                return Err(GenerateError::Timeout {
                    prompt_id: prompt_id.to_string(),
                    last_status,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}
