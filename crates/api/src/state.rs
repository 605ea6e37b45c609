use std::sync::Arc;

use anima_pipeline::generator::Generator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; inner data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The generation orchestrator (owns the backend client and the
    /// history ledger).
    pub generator: Arc<Generator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
