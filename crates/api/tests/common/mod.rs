use std::sync::Arc;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use anima_api::config::ServerConfig;
use anima_api::routes;
use anima_api::state::AppState;
use anima_pipeline::config::GeneratorConfig;
use anima_pipeline::generator::Generator;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Build the application router against an unreachable backend.
///
/// These tests exercise only paths that reject at the boundary, before
/// any backend call, so the ComfyUI URL points at a discard port.
pub fn build_test_app() -> Router {
    let generator_config = GeneratorConfig {
        comfyui_url: "http://127.0.0.1:1".to_string(),
        download_images: false,
        ..Default::default()
    };
    let generator = Generator::new(generator_config).expect("test generator config is valid");

    let state = AppState {
        generator: Arc::new(generator),
        config: Arc::new(test_config()),
    };

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
