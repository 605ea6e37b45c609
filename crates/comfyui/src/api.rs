//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (workflow submission, history retrieval,
//! artifact download, model listing) using [`reqwest`]. The client is
//! stateless beyond its connection pool; all calls are single requests
//! with a per-request timeout and no internal retries.

use std::sync::LazyLock;
use std::time::Duration;

use serde_json::Value;

use anima_core::error::CoreError;

/// Stable per-process client identifier sent with every submission so the
/// backend can correlate queue entries to this process.
static CLIENT_ID: LazyLock<String> = LazyLock::new(|| uuid::Uuid::new_v4().to_string());

/// Model folders the backend exposes under `/models/{folder}`.
pub const MODEL_FOLDERS: &[&str] = &["loras", "diffusion_models", "vae", "text_encoders"];

/// Validate a caller-supplied model folder name.
pub fn validate_model_folder(folder: &str) -> Result<(), CoreError> {
    if MODEL_FOLDERS.contains(&folder) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown model folder '{folder}'. Valid folders: {}",
            MODEL_FOLDERS.join(", ")
        )))
    }
}

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after successfully
/// queuing a workflow.
#[derive(Debug)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue, when reported.
    pub number: Option<i64>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// `/prompt` answered 2xx but without a usable `prompt_id`.
    #[error("ComfyUI /prompt returned no usable prompt_id: {body}")]
    MissingPromptId { body: String },

    /// A URL could not be constructed from the configured base.
    #[error("Invalid ComfyUI URL: {0}")]
    InvalidUrl(String),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`. A trailing
    ///   slash is stripped; the URL is validated up front.
    /// * `request_timeout` - per-request timeout, independent of any
    ///   higher-level polling deadline.
    pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self, ComfyUIApiError> {
        let api_url = api_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&api_url)
            .map_err(|e| ComfyUIApiError::InvalidUrl(format!("{api_url}: {e}")))?;
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, api_url })
    }

    /// The stable per-process client identifier.
    pub fn client_id() -> &'static str {
        &CLIENT_ID
    }

    /// Base HTTP API URL (e.g. `http://host:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given job graph and the
    /// process client ID. A 2xx response without a non-empty `prompt_id`
    /// is a submission failure, not a success.
    pub async fn submit_workflow(&self, workflow: &Value) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": Self::client_id(),
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        let value: Value = Self::parse_response(response).await?;
        let prompt_id = value
            .get("prompt_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if prompt_id.is_empty() {
            return Err(ComfyUIApiError::MissingPromptId { body: value.to_string() });
        }
        let number = value.get("number").and_then(Value::as_i64);

        tracing::debug!(prompt_id = %prompt_id, queue_position = ?number, "Workflow queued");
        Ok(SubmitResponse { prompt_id, number })
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a single `GET /history/{prompt_id}` request. The returned
    /// mapping contains the prompt's entry once execution has completed;
    /// an absent key means "not yet complete". No internal retry.
    pub async fn get_history(&self, prompt_id: &str) -> Result<Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// The browser-reachable `/view` URL for an artifact.
    pub fn view_url(
        &self,
        filename: &str,
        subfolder: &str,
        folder_type: &str,
    ) -> Result<String, ComfyUIApiError> {
        reqwest::Url::parse_with_params(
            &format!("{}/view", self.api_url),
            &[("filename", filename), ("subfolder", subfolder), ("type", folder_type)],
        )
        .map(|url| url.to_string())
        .map_err(|e| ComfyUIApiError::InvalidUrl(e.to_string()))
    }

    /// Download an artifact's raw bytes via `GET /view`.
    pub async fn fetch_view(
        &self,
        filename: &str,
        subfolder: &str,
        folder_type: &str,
    ) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[("filename", filename), ("subfolder", subfolder), ("type", folder_type)])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// List model files the backend exposes for one folder.
    ///
    /// Sends `GET /models/{folder}`. The folder name must come from
    /// [`MODEL_FOLDERS`]; callers validate via [`validate_model_folder`].
    pub async fn list_models(&self, folder: &str) -> Result<Vec<String>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/models/{}", self.api_url, folder))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or a [`ComfyUIApiError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_is_stable_within_the_process() {
        assert_eq!(ComfyUIApi::client_id(), ComfyUIApi::client_id());
        assert!(!ComfyUIApi::client_id().is_empty());
    }

    #[test]
    fn view_url_percent_encodes_query_values() {
        let api = ComfyUIApi::new("http://127.0.0.1:8188/", Duration::from_secs(5)).unwrap();
        let url = api.view_url("out&1.png", "sub/dir", "output").unwrap();
        assert!(url.starts_with("http://127.0.0.1:8188/view?"));
        assert!(url.contains("filename=out%261.png"), "{url}");
        assert!(url.contains("type=output"));
    }

    #[test]
    fn base_url_is_validated_and_normalized() {
        let api = ComfyUIApi::new("http://host:8188/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.api_url(), "http://host:8188");
        assert!(ComfyUIApi::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn model_folder_validation() {
        for folder in MODEL_FOLDERS {
            assert!(validate_model_folder(folder).is_ok());
        }
        assert!(validate_model_folder("checkpoints").is_err());
    }
}
