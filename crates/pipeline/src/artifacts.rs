//! Artifact extraction and materialization.
//!
//! A completed history entry references its outputs by filename, subfolder
//! and storage kind. Extraction collects those references; materialization
//! always fetches the raw bytes (base64 and data-URL views need them even
//! when nothing is persisted locally) and optionally mirrors the backend's
//! subfolder layout under the configured output directory.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use anima_comfyui::api::{ComfyUIApi, ComfyUIApiError};
use anima_core::media;

use crate::config::GeneratorConfig;
use crate::error::GenerateError;

/// A produced output unit as referenced by the backend's status metadata.
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    pub filename: String,
    pub subfolder: String,
    pub folder_type: String,
    pub view_url: String,
}

/// Derived views of one fetched artifact, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOutput {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub folder_type: String,
    /// Backend-relative view URL.
    pub url: String,
    /// Local path when persistence is enabled.
    pub file_path: Option<String>,
    /// Base64 payload of the raw bytes.
    pub base64: Option<String>,
    pub mime_type: String,
    /// `data:` URL suitable for direct embedding.
    pub data_url: Option<String>,
    /// Markdown image reference pointing at the view URL.
    pub markdown: String,
}

/// Collect artifact references from a completed history entry.
///
/// Iterates every output node and keeps each image-like entry with a
/// non-empty filename. Nodes without an `images` array are skipped.
pub fn extract_artifacts(
    api: &ComfyUIApi,
    history_item: &Value,
) -> Result<Vec<ArtifactRef>, ComfyUIApiError> {
    let mut artifacts = Vec::new();

    let Some(outputs) = history_item.get("outputs").and_then(Value::as_object) else {
        return Ok(artifacts);
    };

    for node_output in outputs.values() {
        let Some(images) = node_output.get("images").and_then(Value::as_array) else {
            continue;
        };
        for image in images {
            let filename = image
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if filename.is_empty() {
                continue;
            }
            let subfolder = image
                .get("subfolder")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let folder_type = image
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("output")
                .to_string();
            let view_url = api.view_url(&filename, &subfolder, &folder_type)?;
            artifacts.push(ArtifactRef {
                filename,
                subfolder,
                folder_type,
                view_url,
            });
        }
    }

    Ok(artifacts)
}

/// Fetch one artifact's bytes and derive its output representations.
pub async fn materialize(
    api: &ComfyUIApi,
    config: &GeneratorConfig,
    artifact: &ArtifactRef,
) -> Result<ArtifactOutput, GenerateError> {
    let bytes = api
        .fetch_view(&artifact.filename, &artifact.subfolder, &artifact.folder_type)
        .await?;

    let file_path = if config.download_images {
        let sub_dir = if artifact.subfolder.is_empty() {
            config.output_dir.clone()
        } else {
            config.output_dir.join(&artifact.subfolder)
        };
        tokio::fs::create_dir_all(&sub_dir).await?;
        let dst = sub_dir.join(&artifact.filename);
        tokio::fs::write(&dst, &bytes).await?;
        tracing::debug!(path = %dst.display(), "Artifact persisted");
        Some(dst.to_string_lossy().into_owned())
    } else {
        None
    };

    let mime_type = media::mime_for_filename(&artifact.filename);
    let payload = BASE64.encode(&bytes);
    let data_url = media::data_url(mime_type, &payload);
    let markdown = media::markdown_image(&artifact.filename, &artifact.view_url);

    Ok(ArtifactOutput {
        filename: artifact.filename.clone(),
        subfolder: artifact.subfolder.clone(),
        folder_type: artifact.folder_type.clone(),
        url: artifact.view_url.clone(),
        file_path,
        base64: Some(payload),
        mime_type: mime_type.to_string(),
        data_url: Some(data_url),
        markdown,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn test_api() -> ComfyUIApi {
        ComfyUIApi::new("http://127.0.0.1:8188", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn extracts_every_named_image_across_nodes() {
        let history_item = json!({
            "outputs": {
                "52": {
                    "images": [
                        { "filename": "a.png", "subfolder": "", "type": "output" },
                        { "filename": "b.png", "subfolder": "batch", "type": "output" },
                    ]
                },
                "53": {
                    "images": [
                        { "filename": "", "subfolder": "", "type": "temp" },
                        { "filename": "c.webp" },
                    ]
                },
                "54": { "text": ["not an image node"] }
            }
        });

        let mut artifacts = extract_artifacts(&test_api(), &history_item).unwrap();
        artifacts.sort_by(|a, b| a.filename.cmp(&b.filename));
        let names: Vec<&str> = artifacts.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png", "c.webp"]);

        // Missing metadata falls back to empty subfolder / "output" kind.
        let c = &artifacts[2];
        assert_eq!(c.subfolder, "");
        assert_eq!(c.folder_type, "output");
        assert!(c.view_url.contains("filename=c.webp"), "{}", c.view_url);
    }

    #[test]
    fn missing_outputs_section_yields_no_artifacts() {
        let artifacts = extract_artifacts(&test_api(), &json!({})).unwrap();
        assert!(artifacts.is_empty());
    }
}
