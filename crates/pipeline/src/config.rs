//! Generator configuration loaded from environment variables.

use std::path::PathBuf;

use anima_core::resolution::{DEFAULT_ROUND_TO, DEFAULT_TARGET_MEGAPIXELS};

/// Configuration for the generation pipeline.
///
/// All fields have defaults suitable for a local ComfyUI instance on the
/// standard port. Override via environment variables in production.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base HTTP URL of the ComfyUI instance (default: `http://127.0.0.1:8188`).
    pub comfyui_url: String,
    /// Per-request HTTP timeout in seconds (default: `120`).
    pub request_timeout_secs: u64,
    /// Overall poll deadline per job in seconds (default: `600`).
    pub generation_timeout_secs: u64,
    /// Sleep between history polls in milliseconds (default: `1000`).
    pub poll_interval_ms: u64,
    /// Whether fetched artifacts are also written to `output_dir`.
    pub download_images: bool,
    /// Local directory mirroring the backend's subfolder layout.
    pub output_dir: PathBuf,
    /// Pixel budget in megapixels when only an aspect ratio is given.
    pub target_megapixels: f64,
    /// Dimension rounding granularity; must stay compatible with the
    /// backend's VAE downscale times its spatial patch size.
    pub round_to: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            comfyui_url: "http://127.0.0.1:8188".to_string(),
            request_timeout_secs: 120,
            generation_timeout_secs: 600,
            poll_interval_ms: 1000,
            download_images: true,
            output_dir: PathBuf::from("outputs"),
            target_megapixels: DEFAULT_TARGET_MEGAPIXELS,
            round_to: DEFAULT_ROUND_TO,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `COMFYUI_URL`              | `http://127.0.0.1:8188`  |
    /// | `COMFYUI_REQUEST_TIMEOUT_SECS` | `120`                |
    /// | `GENERATION_TIMEOUT_SECS`  | `600`                    |
    /// | `POLL_INTERVAL_MS`         | `1000`                   |
    /// | `DOWNLOAD_IMAGES`          | `true`                   |
    /// | `OUTPUT_DIR`               | `outputs`                |
    /// | `TARGET_MEGAPIXELS`        | `1.0`                    |
    /// | `ROUND_TO`                 | `16`                     |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let comfyui_url =
            std::env::var("COMFYUI_URL").unwrap_or(defaults.comfyui_url);

        let request_timeout_secs: u64 = std::env::var("COMFYUI_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.request_timeout_secs.to_string())
            .parse()
            .expect("COMFYUI_REQUEST_TIMEOUT_SECS must be a valid u64");

        let generation_timeout_secs: u64 = std::env::var("GENERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.generation_timeout_secs.to_string())
            .parse()
            .expect("GENERATION_TIMEOUT_SECS must be a valid u64");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| defaults.poll_interval_ms.to_string())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let download_images: bool = std::env::var("DOWNLOAD_IMAGES")
            .unwrap_or_else(|_| defaults.download_images.to_string())
            .parse()
            .expect("DOWNLOAD_IMAGES must be true or false");

        let output_dir = std::env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let target_megapixels: f64 = std::env::var("TARGET_MEGAPIXELS")
            .unwrap_or_else(|_| defaults.target_megapixels.to_string())
            .parse()
            .expect("TARGET_MEGAPIXELS must be a valid f64");

        let round_to: u32 = std::env::var("ROUND_TO")
            .unwrap_or_else(|_| defaults.round_to.to_string())
            .parse()
            .expect("ROUND_TO must be a valid u32");

        Self {
            comfyui_url,
            request_timeout_secs,
            generation_timeout_secs,
            poll_interval_ms,
            download_images,
            output_dir,
            target_megapixels,
            round_to,
        }
    }
}
