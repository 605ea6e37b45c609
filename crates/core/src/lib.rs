//! Core domain logic for the Anima generation orchestrator.
//!
//! Pure, I/O-free building blocks: the caller-facing parameter record and
//! its validation, dimension resolution under divisibility constraints,
//! positive-prompt composition, and media-type helpers. Everything that
//! talks to the network lives in `anima-comfyui` and `anima-pipeline`.

pub mod error;
pub mod media;
pub mod params;
pub mod prompt;
pub mod resolution;
pub mod types;
