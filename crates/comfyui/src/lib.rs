//! ComfyUI integration for the Anima generation pipeline.
//!
//! Provides the REST API client (workflow submission, history polling,
//! artifact retrieval, model listing) and the embedded Anima workflow
//! template with its parameter injection.

pub mod api;
pub mod workflow;
