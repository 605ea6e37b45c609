//! The embedded Anima workflow template and parameter injection.
//!
//! The template is a fixed ComfyUI prompt graph whose node identifiers are
//! part of the contract with the checkpoint: loaders, text encoders,
//! latent, sampler, and save nodes sit at known ids. It is parsed once at
//! startup into read-only memory; every injection starts from a fresh
//! structural copy so concurrent jobs never interfere.

use std::sync::LazyLock;

use rand::Rng;
use serde_json::{json, Value};

use anima_core::params::GenerationParams;

// ---------------------------------------------------------------------------
// Node identifier contract
// ---------------------------------------------------------------------------

/// CLIPLoader node (text encoder model file).
pub const NODE_CLIP_LOADER: &str = "45";

/// UNETLoader node (diffusion model file).
pub const NODE_UNET_LOADER: &str = "44";

/// VAELoader node.
pub const NODE_VAE_LOADER: &str = "15";

/// Positive CLIPTextEncode node.
pub const NODE_POSITIVE: &str = "11";

/// Negative CLIPTextEncode node.
pub const NODE_NEGATIVE: &str = "12";

/// EmptyLatentImage node (width, height, batch_size).
pub const NODE_LATENT: &str = "28";

/// KSampler node (seed, steps, cfg, sampler_name, scheduler, denoise).
pub const NODE_SAMPLER: &str = "19";

/// SaveImage node (filename_prefix).
pub const NODE_SAVE: &str = "52";

/// LoRA chain nodes are appended starting at this id; the template itself
/// never uses ids in this range.
const LORA_NODE_BASE: u32 = 200;

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

static WORKFLOW_TEMPLATE: LazyLock<Value> = LazyLock::new(|| {
    serde_json::from_str(include_str!("workflow_template.json"))
        .expect("embedded workflow_template.json must be valid JSON")
});

/// The immutable process-wide workflow template.
pub fn template() -> &'static Value {
    &WORKFLOW_TEMPLATE
}

/// Draw a fresh random seed.
///
/// Seeds are drawn as `u32` and widened, keeping them comfortably inside
/// the sampler's accepted range.
pub fn random_seed() -> u64 {
    rand::rng().random::<u32>() as u64
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Injection
// ---------------------------------------------------------------------------

/// Produce a concrete job graph from the template and a parameter record.
///
/// Overwrites, in order: optional model-file slots, text slots, the
/// resolution/batch slot, the sampler slot, the output-naming slot, and
/// finally the LoRA chain. A sampler field that is absent or zero/blank
/// keeps the template's built-in value; the seed is always written —
/// caller-pinned or freshly random.
pub fn inject(
    params: &GenerationParams,
    width: u32,
    height: u32,
    positive: &str,
    negative: &str,
) -> Value {
    let mut wf = template().clone();

    // Model-file overrides.
    if let Some(name) = non_empty(&params.clip_name) {
        wf[NODE_CLIP_LOADER]["inputs"]["clip_name"] = json!(name);
    }
    if let Some(name) = non_empty(&params.unet_name) {
        wf[NODE_UNET_LOADER]["inputs"]["unet_name"] = json!(name);
    }
    if let Some(name) = non_empty(&params.vae_name) {
        wf[NODE_VAE_LOADER]["inputs"]["vae_name"] = json!(name);
    }

    // Text slots.
    wf[NODE_POSITIVE]["inputs"]["text"] = json!(positive);
    wf[NODE_NEGATIVE]["inputs"]["text"] = json!(negative);

    // Resolution and latent batch.
    wf[NODE_LATENT]["inputs"]["width"] = json!(width);
    wf[NODE_LATENT]["inputs"]["height"] = json!(height);
    let batch_size = params.batch_size.filter(|b| *b > 0).unwrap_or(1);
    wf[NODE_LATENT]["inputs"]["batch_size"] = json!(batch_size);

    // Sampler slot. Zero is treated as unset, matching the wire contract.
    let seed = params.seed.unwrap_or_else(random_seed);
    wf[NODE_SAMPLER]["inputs"]["seed"] = json!(seed);
    if let Some(steps) = params.steps.filter(|s| *s > 0) {
        wf[NODE_SAMPLER]["inputs"]["steps"] = json!(steps);
    }
    if let Some(cfg) = params.cfg.filter(|c| *c > 0.0) {
        wf[NODE_SAMPLER]["inputs"]["cfg"] = json!(cfg);
    }
    if let Some(sampler) = non_empty(&params.sampler_name) {
        wf[NODE_SAMPLER]["inputs"]["sampler_name"] = json!(sampler);
    }
    if let Some(scheduler) = non_empty(&params.scheduler) {
        wf[NODE_SAMPLER]["inputs"]["scheduler"] = json!(scheduler);
    }
    if let Some(denoise) = params.denoise.filter(|d| *d > 0.0) {
        wf[NODE_SAMPLER]["inputs"]["denoise"] = json!(denoise);
    }

    // Output naming.
    if let Some(prefix) = non_empty(&params.filename_prefix) {
        wf[NODE_SAVE]["inputs"]["filename_prefix"] = json!(prefix);
    }

    inject_lora_chain(&mut wf, params);

    wf
}

/// Chain `LoraLoaderModelOnly` nodes between the UNET loader and the
/// sampler, in caller order. The sampler's `model` input is rewired to the
/// tail of the chain.
fn inject_lora_chain(wf: &mut Value, params: &GenerationParams) {
    let Some(loras) = params.loras.as_ref().filter(|l| !l.is_empty()) else {
        return;
    };

    let mut upstream = json!([NODE_UNET_LOADER, 0]);
    for (i, lora) in loras.iter().enumerate() {
        let node_id = (LORA_NODE_BASE + i as u32).to_string();
        wf[node_id.as_str()] = json!({
            "class_type": "LoraLoaderModelOnly",
            "inputs": {
                "lora_name": lora.name,
                "strength_model": lora.weight,
                "model": upstream,
            }
        });
        upstream = json!([node_id, 0]);
    }
    wf[NODE_SAMPLER]["inputs"]["model"] = upstream;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use anima_core::params::LoraRef;

    use super::*;

    fn base_params() -> GenerationParams {
        GenerationParams {
            tags: Some("smile".to_string()),
            neg: Some("blurry".to_string()),
            ..Default::default()
        }
    }

    // -- slot injection --

    #[test]
    fn text_and_resolution_slots_are_written() {
        let wf = inject(&base_params(), 1024, 768, "1girl, smile", "blurry");
        assert_eq!(wf[NODE_POSITIVE]["inputs"]["text"], "1girl, smile");
        assert_eq!(wf[NODE_NEGATIVE]["inputs"]["text"], "blurry");
        assert_eq!(wf[NODE_LATENT]["inputs"]["width"], 1024);
        assert_eq!(wf[NODE_LATENT]["inputs"]["height"], 768);
        assert_eq!(wf[NODE_LATENT]["inputs"]["batch_size"], 1);
    }

    #[test]
    fn model_overrides_only_apply_when_non_empty() {
        let mut params = base_params();
        params.unet_name = Some("anima_v2.safetensors".to_string());
        params.vae_name = Some("  ".to_string());
        let wf = inject(&params, 512, 512, "", "");
        assert_eq!(wf[NODE_UNET_LOADER]["inputs"]["unet_name"], "anima_v2.safetensors");
        assert_eq!(wf[NODE_VAE_LOADER]["inputs"]["vae_name"], "anima_vae.safetensors");
        assert_eq!(wf[NODE_CLIP_LOADER]["inputs"]["clip_name"], "t5xxl_fp16.safetensors");
    }

    #[test]
    fn zero_sampler_values_keep_template_defaults() {
        let mut params = base_params();
        params.steps = Some(0);
        params.cfg = Some(0.0);
        params.denoise = Some(0.0);
        params.sampler_name = Some(String::new());
        let wf = inject(&params, 512, 512, "", "");
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["steps"], 25);
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["cfg"], 4.5);
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["denoise"], 1.0);
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["sampler_name"], "er_sde");
    }

    #[test]
    fn explicit_sampler_values_overwrite_defaults() {
        let mut params = base_params();
        params.steps = Some(30);
        params.cfg = Some(6.0);
        params.scheduler = Some("karras".to_string());
        params.seed = Some(42);
        let wf = inject(&params, 512, 512, "", "");
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["steps"], 30);
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["cfg"], 6.0);
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["scheduler"], "karras");
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["seed"], 42);
    }

    #[test]
    fn absent_seed_gets_a_random_value() {
        let wf = inject(&base_params(), 512, 512, "", "");
        let seed = wf[NODE_SAMPLER]["inputs"]["seed"].as_u64().expect("seed must be set");
        assert!(seed <= u32::MAX as u64);
    }

    // -- template immutability --

    #[test]
    fn template_survives_two_divergent_injections() {
        let mut a = base_params();
        a.steps = Some(50);
        let wf_a = inject(&a, 512, 512, "first", "");

        let mut b = base_params();
        b.steps = Some(10);
        let wf_b = inject(&b, 1024, 1024, "second", "");

        assert_eq!(wf_a[NODE_POSITIVE]["inputs"]["text"], "first");
        assert_eq!(wf_b[NODE_POSITIVE]["inputs"]["text"], "second");
        assert_eq!(wf_a[NODE_SAMPLER]["inputs"]["steps"], 50);
        assert_eq!(wf_b[NODE_SAMPLER]["inputs"]["steps"], 10);

        // The shared template is untouched.
        assert_eq!(template()[NODE_POSITIVE]["inputs"]["text"], "");
        assert_eq!(template()[NODE_SAMPLER]["inputs"]["steps"], 25);
        assert_eq!(template()[NODE_LATENT]["inputs"]["width"], 1024);
    }

    // -- LoRA chain --

    #[test]
    fn lora_chain_rewires_the_sampler_model_input() {
        let mut params = base_params();
        params.loras = Some(vec![
            LoraRef { name: "style/ink.safetensors".to_string(), weight: 0.8 },
            LoraRef { name: "detail.safetensors".to_string(), weight: 1.0 },
        ]);
        let wf = inject(&params, 512, 512, "", "");

        assert_eq!(wf["200"]["class_type"], "LoraLoaderModelOnly");
        assert_eq!(wf["200"]["inputs"]["lora_name"], "style/ink.safetensors");
        assert_eq!(wf["200"]["inputs"]["strength_model"], 0.8);
        assert_eq!(wf["200"]["inputs"]["model"], json!([NODE_UNET_LOADER, 0]));

        assert_eq!(wf["201"]["inputs"]["model"], json!(["200", 0]));
        assert_eq!(wf[NODE_SAMPLER]["inputs"]["model"], json!(["201", 0]));

        // No chain, no rewiring.
        let plain = inject(&base_params(), 512, 512, "", "");
        assert_eq!(plain[NODE_SAMPLER]["inputs"]["model"], json!([NODE_UNET_LOADER, 0]));
        assert!(plain.get("200").is_none());
    }
}
