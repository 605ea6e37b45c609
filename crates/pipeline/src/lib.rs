//! Generation orchestration for the Anima service.
//!
//! Drives one job end-to-end against the ComfyUI backend — inject, submit,
//! poll until complete or deadline, fetch artifacts, materialize output
//! representations — and keeps the append-only history ledger that powers
//! reroll.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod generator;
pub mod history;
