//! The caller-facing generation parameter record.
//!
//! Every field is optional at the type level; required-field rules are
//! enforced once at the service boundary by [`validate_request`], never at
//! deep call sites. All optional fields carry `skip_serializing_if` so the
//! serialized form contains exactly the keys the caller set — the reroll
//! merge in [`merge_for_reroll`] relies on this to be a precise
//! "key-by-key, non-null only" overlay.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits and enumerations
// ---------------------------------------------------------------------------

/// Maximum independent submissions per request.
pub const MAX_REPEAT: u32 = 16;

/// Maximum latent batch size per submission.
pub const MAX_BATCH_SIZE: u32 = 4;

/// Artist entries must start with this marker so the backend's tag parser
/// recognizes them.
pub const ARTIST_MARKER: char = '@';

/// The standard aspect ratios accepted at the service boundary.
pub const VALID_ASPECT_RATIOS: &[&str] = &[
    "21:9", "2:1", "16:9", "16:10", "5:3", "3:2", "4:3", "1:1", "3:4", "2:3",
    "3:5", "10:16", "9:16", "1:2", "9:21",
];

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// An auxiliary LoRA reference: model file name plus blend weight.
///
/// `name` must match the backend's `/models/loras` listing verbatim,
/// including subdirectory separators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraRef {
    pub name: String,
    #[serde(default = "default_lora_weight")]
    pub weight: f64,
}

fn default_lora_weight() -> f64 {
    1.0
}

/// Structured description of one generation request.
///
/// Serde names match the wire format; `neg` also accepts the legacy
/// `negative` key. Unknown keys are preserved in `extra` so records stay
/// forward-compatible through history storage and reroll.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GenerationParams {
    /// Optional human-readable request summary; not sent to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_hint: Option<String>,

    /// Combined positive text override. When set, the semantic fields
    /// below are ignored for text composition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positive: Option<String>,

    // -- resolution inputs --
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_megapixels: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_to: Option<u32>,

    // -- semantic prompt fields, in composition order --
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_meta_year_safe: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nltags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Negative prompt text.
    #[serde(alias = "negative", skip_serializing_if = "Option::is_none")]
    pub neg: Option<String>,

    // -- sampling parameters --
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    // -- submission shape --
    #[validate(range(min = 1, max = 16))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
    #[validate(range(min = 1, max = 4))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_prefix: Option<String>,

    // -- model-file overrides --
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vae_name: Option<String>,

    /// Ordered LoRA chain, injected between the UNET loader and sampler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loras: Option<Vec<LoraRef>>,

    /// Residual keys, preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationParams {
    /// The combined positive override, if it is non-blank.
    pub fn positive_override(&self) -> Option<&str> {
        self.positive.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Number of independent submissions this request asks for.
    pub fn repeat_count(&self) -> u32 {
        self.repeat.unwrap_or(1).clamp(1, MAX_REPEAT)
    }
}

// ---------------------------------------------------------------------------
// Boundary validation
// ---------------------------------------------------------------------------

/// Names of the fields that must be present and non-blank at the boundary.
const REQUIRED_FIELDS: &[&str] = &["quality_meta_year_safe", "count", "artist", "tags", "neg"];

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Validate a generation request at the service boundary.
///
/// Checks, in order: numeric ranges (`repeat`, `batch_size`), required
/// fields, the artist marker on every comma-separated artist entry, and
/// aspect-ratio membership in [`VALID_ASPECT_RATIOS`]. Runs before any
/// network traffic; deep call sites assume a validated record.
pub fn validate_request(params: &GenerationParams) -> Result<(), CoreError> {
    params
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let present = [
        &params.quality_meta_year_safe,
        &params.count,
        &params.artist,
        &params.tags,
        &params.neg,
    ];
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .zip(present)
        .filter(|(_, value)| is_blank(value))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    validate_artist(params.artist.as_deref().unwrap_or(""))?;

    if let Some(ratio) = params.aspect_ratio.as_deref().map(str::trim) {
        if !ratio.is_empty() && !VALID_ASPECT_RATIOS.contains(&ratio) {
            return Err(CoreError::Validation(format!(
                "Unsupported aspect_ratio '{ratio}'. Valid ratios: {}",
                VALID_ASPECT_RATIOS.join(", ")
            )));
        }
    }

    Ok(())
}

/// Validate the artist field: every comma-separated entry must start with
/// the `@` marker. Multi-artist mixing is allowed but reduces stability,
/// so single entries are the documented recommendation.
pub fn validate_artist(artist: &str) -> Result<(), CoreError> {
    for entry in artist.split(',') {
        let entry = entry.trim();
        if entry.is_empty() || !entry.starts_with(ARTIST_MARKER) {
            return Err(CoreError::Validation(format!(
                "Artist entries must start with '{ARTIST_MARKER}' (e.g. '@fkey'), got '{artist}'"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reroll merge
// ---------------------------------------------------------------------------

/// Merge reroll overrides into a stored parameter record.
///
/// Starts from a copy of `base`, overlays every key the caller set in
/// `overrides` (unset keys never serialize, so they cannot clobber), then
/// drops the seed unless the override explicitly pinned one — reroll
/// defaults to variation, not exact repetition.
pub fn merge_for_reroll(
    base: &GenerationParams,
    overrides: &GenerationParams,
) -> Result<GenerationParams, CoreError> {
    let mut merged = match serde_json::to_value(base) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => unreachable!("GenerationParams always serializes to an object"),
        Err(e) => return Err(CoreError::Internal(format!("Failed to serialize params: {e}"))),
    };
    let override_map = match serde_json::to_value(overrides) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => unreachable!("GenerationParams always serializes to an object"),
        Err(e) => return Err(CoreError::Internal(format!("Failed to serialize params: {e}"))),
    };

    for (key, value) in override_map {
        if !value.is_null() {
            merged.insert(key, value);
        }
    }

    if overrides.seed.is_none() {
        merged.remove("seed");
    }

    serde_json::from_value(serde_json::Value::Object(merged))
        .map_err(|e| CoreError::Internal(format!("Failed to merge params: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
