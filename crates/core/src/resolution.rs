//! Output dimension resolution under backend divisibility constraints.
//!
//! The Anima checkpoint runs on a Cosmos-style architecture: the VAE
//! downscales by 8 and the latent must additionally be divisible by the
//! spatial patch size of 2, so resolved dimensions must be multiples of
//! 16 or the backend rejects the job with "should be divisible by
//! spatial_patch_size". Callers may pass a different `round_to`; the
//! resolver only rounds up to whatever granularity it is given.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest dimension the backend accepts on either axis.
pub const MIN_DIMENSION: u32 = 64;

/// Default rounding granularity: VAE downscale (8) x spatial patch size (2).
pub const DEFAULT_ROUND_TO: u32 = 16;

/// Default pixel budget when only an aspect ratio is supplied.
pub const DEFAULT_TARGET_MEGAPIXELS: f64 = 1.0;

/// Square fallback edge when neither dimensions nor a ratio are supplied.
/// Must stay a multiple of [`DEFAULT_ROUND_TO`].
pub const FALLBACK_EDGE: u32 = 1024;

// ---------------------------------------------------------------------------
// Alignment helpers
// ---------------------------------------------------------------------------

/// Round `value` up to the nearest multiple of `base`.
///
/// A `base` of 0 or 1 leaves the value unchanged.
pub fn round_up_to(value: u32, base: u32) -> u32 {
    if base <= 1 {
        return value;
    }
    value.div_ceil(base) * base
}

/// Align a caller-supplied dimension: floor at [`MIN_DIMENSION`], then
/// round up to a multiple of `round_to`.
pub fn align_dimension(value: u32, round_to: u32) -> u32 {
    round_up_to(value.max(MIN_DIMENSION), round_to)
}

// ---------------------------------------------------------------------------
// Aspect ratio parsing and estimation
// ---------------------------------------------------------------------------

/// Parse an `"A:B"` aspect ratio string into `A / B`.
///
/// Both components must parse as positive real numbers.
pub fn parse_aspect_ratio(ratio: &str) -> Result<f64, CoreError> {
    let s = ratio.trim();
    let Some((a_str, b_str)) = s.split_once(':') else {
        return Err(CoreError::Validation(format!(
            "aspect_ratio must look like '16:9', got '{ratio}'"
        )));
    };
    let a: f64 = a_str.trim().parse().map_err(|_| {
        CoreError::Validation(format!("aspect_ratio must look like '16:9', got '{ratio}'"))
    })?;
    let b: f64 = b_str.trim().parse().map_err(|_| {
        CoreError::Validation(format!("aspect_ratio must look like '16:9', got '{ratio}'"))
    })?;
    if a <= 0.0 || b <= 0.0 {
        return Err(CoreError::Validation(format!(
            "Both sides of aspect_ratio must be > 0, got '{ratio}'"
        )));
    }
    Ok(a / b)
}

/// Estimate width/height from an aspect ratio and a pixel budget.
///
/// Targets `max(1, target_megapixels)` million pixels, then floors each
/// axis at [`MIN_DIMENSION`] and rounds up to a multiple of `round_to`.
pub fn estimate_size_from_ratio(
    aspect_ratio: &str,
    target_megapixels: f64,
    round_to: u32,
) -> Result<(u32, u32), CoreError> {
    let r = parse_aspect_ratio(aspect_ratio)?;
    let target_px = target_megapixels.max(1.0) * 1_000_000.0;
    let w = (target_px * r).sqrt() as u32;
    let h = (target_px / r).sqrt() as u32;
    Ok((align_dimension(w, round_to), align_dimension(h, round_to)))
}

// ---------------------------------------------------------------------------
// Resolution entry point
// ---------------------------------------------------------------------------

/// Resolve the final output dimensions for a job.
///
/// Branch order:
/// 1. Explicit `width` AND `height`: each aligned independently; the
///    aspect ratio and pixel budget are ignored.
/// 2. A non-blank aspect ratio: estimated from the pixel budget.
/// 3. Neither: the square [`FALLBACK_EDGE`] default.
pub fn resolve_dimensions(
    aspect_ratio: Option<&str>,
    target_megapixels: f64,
    width: Option<u32>,
    height: Option<u32>,
    round_to: u32,
) -> Result<(u32, u32), CoreError> {
    if let (Some(w), Some(h)) = (width, height) {
        return Ok((align_dimension(w, round_to), align_dimension(h, round_to)));
    }
    if let Some(ratio) = aspect_ratio.map(str::trim).filter(|r| !r.is_empty()) {
        return estimate_size_from_ratio(ratio, target_megapixels, round_to);
    }
    Ok((FALLBACK_EDGE, FALLBACK_EDGE))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
