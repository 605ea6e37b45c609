//! Orchestrator tests against a stub ComfyUI server.
//!
//! The stub is a minimal axum app bound to an ephemeral port implementing
//! the three endpoints the pipeline consumes: `/prompt`, `/history/{id}`,
//! and `/view`. Completion timing and submission behavior are configured
//! per test.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use anima_comfyui::workflow::{NODE_POSITIVE, NODE_SAMPLER};
use anima_core::params::GenerationParams;
use anima_pipeline::config::GeneratorConfig;
use anima_pipeline::error::GenerateError;
use anima_pipeline::generator::Generator;

/// PNG magic bytes stand in for a rendered image.
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Clone)]
struct Stub {
    /// How many `/history` polls answer "not yet complete" first.
    polls_before_complete: usize,
    /// When set, `/prompt` answers 200 without a prompt_id.
    omit_prompt_id: bool,
    polls: Arc<AtomicUsize>,
    submissions: Arc<Mutex<Vec<Value>>>,
}

impl Stub {
    fn new(polls_before_complete: usize) -> Self {
        Self {
            polls_before_complete,
            omit_prompt_id: false,
            polls: Arc::new(AtomicUsize::new(0)),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    fn submitted_graph(&self, index: usize) -> Value {
        self.submissions.lock().unwrap()[index]["prompt"].clone()
    }
}

async fn stub_prompt(State(stub): State<Stub>, Json(body): Json<Value>) -> Json<Value> {
    let mut submissions = stub.submissions.lock().unwrap();
    submissions.push(body);
    if stub.omit_prompt_id {
        Json(json!({}))
    } else {
        let n = submissions.len();
        Json(json!({ "prompt_id": format!("stub-{n}"), "number": n }))
    }
}

async fn stub_history(State(stub): State<Stub>, Path(id): Path<String>) -> Json<Value> {
    let n = stub.polls.fetch_add(1, Ordering::SeqCst);
    if n < stub.polls_before_complete {
        return Json(json!({}));
    }
    let completed = json!({
        "outputs": {
            "52": {
                "images": [
                    { "filename": "anima_0001.png", "subfolder": "", "type": "output" }
                ]
            }
        }
    });
    let mut envelope = serde_json::Map::new();
    envelope.insert(id, completed);
    Json(Value::Object(envelope))
}

async fn stub_view() -> &'static [u8] {
    PNG_BYTES
}

async fn spawn_stub(stub: Stub) -> SocketAddr {
    let app = Router::new()
        .route("/prompt", post(stub_prompt))
        .route("/history/{id}", get(stub_history))
        .route("/view", get(stub_view))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn test_config(addr: SocketAddr) -> GeneratorConfig {
    GeneratorConfig {
        comfyui_url: format!("http://{addr}"),
        poll_interval_ms: 10,
        generation_timeout_secs: 5,
        download_images: false,
        ..Default::default()
    }
}

fn valid_params() -> GenerationParams {
    serde_json::from_value(json!({
        "quality_meta_year_safe": "masterpiece, safe",
        "count": "1girl",
        "artist": "@fkey",
        "tags": "smile",
        "neg": "blurry",
        "aspect_ratio": "1:1",
        "round_to": 16,
    }))
    .unwrap()
}

// -- happy path --

#[tokio::test]
async fn end_to_end_with_delayed_completion() {
    let stub = Stub::new(2);
    let addr = spawn_stub(stub.clone()).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let result = generator.generate(&valid_params()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.prompt_id, "stub-1");
    // 1:1 at 1.0 MP, rounded up to the next multiple of 16.
    assert_eq!((result.width, result.height), (1008, 1008));
    assert_eq!(result.positive, "masterpiece, safe, 1girl, @fkey, smile");
    assert_eq!(result.negative, "blurry");

    // Two incomplete polls, then the completed entry.
    assert_eq!(stub.polls.load(Ordering::SeqCst), 3);

    assert_eq!(result.images.len(), 1);
    let image = &result.images[0];
    assert_eq!(image.filename, "anima_0001.png");
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.base64.as_deref(), Some(BASE64.encode(PNG_BYTES).as_str()));
    assert!(image
        .data_url
        .as_deref()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert!(image.markdown.starts_with("![anima_0001.png]("));
    assert!(image.file_path.is_none());

    assert_eq!(generator.history().len().await, 1);
    assert_eq!(result.history_id, 1);
}

// -- timeout --

#[tokio::test]
async fn deadline_expiry_reports_timeout_with_last_status() {
    let stub = Stub::new(usize::MAX);
    let addr = spawn_stub(stub).await;
    let mut config = test_config(addr);
    config.generation_timeout_secs = 0;
    let generator = Generator::new(config).unwrap();

    let err = generator.generate(&valid_params()).await.unwrap_err();
    assert_matches!(
        err,
        GenerateError::Timeout { ref prompt_id, last_status: Some(_) } if prompt_id == "stub-1"
    );
}

// -- submission failure --

#[tokio::test]
async fn missing_prompt_id_is_a_submission_error() {
    let mut stub = Stub::new(0);
    stub.omit_prompt_id = true;
    let addr = spawn_stub(stub).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let err = generator.generate(&valid_params()).await.unwrap_err();
    assert_matches!(err, GenerateError::Submission(_));
}

// -- validation happens before any network call --

#[tokio::test]
async fn invalid_request_never_reaches_the_backend() {
    let stub = Stub::new(0);
    let addr = spawn_stub(stub.clone()).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let err = generator
        .generate_batch(GenerationParams::default())
        .await
        .unwrap_err();
    assert_matches!(err, GenerateError::Core(_));
    assert_eq!(stub.submission_count(), 0);
    assert_eq!(stub.polls.load(Ordering::SeqCst), 0);
}

// -- repeat semantics --

#[tokio::test]
async fn repeat_submits_independent_jobs_with_fresh_seeds() {
    let stub = Stub::new(0);
    let addr = spawn_stub(stub.clone()).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let mut params = valid_params();
    params.repeat = Some(3);

    let runs = generator.generate_batch(params).await.unwrap();
    assert_eq!(runs.len(), 3);
    for (i, run) in runs.iter().enumerate() {
        assert_eq!(run.run as usize, i + 1);
        assert!(run.outcome.is_ok(), "run {} failed", run.run);
    }

    assert_eq!(stub.submission_count(), 3);
    assert_eq!(generator.history().len().await, 3);

    for i in 0..3 {
        let graph = stub.submitted_graph(i);
        assert!(graph[NODE_SAMPLER]["inputs"]["seed"].is_u64());
    }
}

#[tokio::test]
async fn pinned_seed_is_reused_across_repeats() {
    let stub = Stub::new(0);
    let addr = spawn_stub(stub.clone()).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let mut params = valid_params();
    params.repeat = Some(2);
    params.seed = Some(777);

    let runs = generator.generate_batch(params).await.unwrap();
    assert!(runs.iter().all(|r| r.outcome.is_ok()));

    for i in 0..2 {
        let graph = stub.submitted_graph(i);
        assert_eq!(graph[NODE_SAMPLER]["inputs"]["seed"], 777);
    }
}

// -- reroll --

#[tokio::test]
async fn reroll_overrides_and_rerandomizes() {
    let stub = Stub::new(0);
    let addr = spawn_stub(stub.clone()).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let mut params = valid_params();
    params.seed = Some(123);
    generator.generate(&params).await.unwrap();

    let overrides: GenerationParams =
        serde_json::from_value(json!({ "artist": "@jima" })).unwrap();
    let runs = generator.reroll("last", &overrides).await.unwrap().unwrap();
    assert_eq!(runs.len(), 1);
    let result = runs[0].outcome.as_ref().unwrap();
    assert!(result.positive.contains("@jima"));
    assert!(!result.positive.contains("@fkey"));

    // The stored seed was dropped, so the reroll drew its own.
    let graph = stub.submitted_graph(1);
    assert!(graph[NODE_SAMPLER]["inputs"]["seed"].is_u64());
    assert_eq!(graph[NODE_POSITIVE]["inputs"]["text"], result.positive.as_str());

    assert_eq!(generator.history().len().await, 2);
}

#[tokio::test]
async fn reroll_with_unknown_source_is_not_found() {
    let stub = Stub::new(0);
    let addr = spawn_stub(stub.clone()).await;
    let generator = Generator::new(test_config(addr)).unwrap();

    let outcome = generator
        .reroll("99", &GenerationParams::default())
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert_eq!(stub.submission_count(), 0);
}
