//! End-to-end tests for the indexing and completion pipeline.
//!
//! A stub backend server stands in for both the embedding provider
//! (OpenAI-compatible `custom` dialect) and the completion LLM. The
//! stub embeds deterministically, counts embedding calls, and echoes
//! the full prompt back as the "completion", so tests can observe
//! exactly which retrieved documents conditioned each completion.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use codefill::completion::CompletionService;
use codefill::config::{Config, LocalConfig, LocalDialect};
use codefill::embedding::{CompletionClient, Embedder, LocalEmbedder};
use codefill::vector::VectorError;
use codefill::{server, ServiceError};

const F1_CONTENT: &str = "fn alpha_unique_token_one() -> u32 { 1 }\n";
const F2_CONTENT: &str = "fn beta_unique_token_two() -> u32 { 2 }\n";
const F3_CONTENT: &str = "fn gamma_unique_token_three() -> u32 { 3 }\n";

/// Deterministic 8-dimensional embedding: byte histogram, normalized.
fn stub_embed(text: &str) -> Vec<f32> {
    let mut buckets = [0f32; 8];
    for (i, byte) in text.bytes().enumerate() {
        buckets[i % 8] += byte as f32;
    }
    let norm = buckets.iter().map(|x| x * x).sum::<f32>().sqrt().max(1.0);
    buckets.iter().map(|x| x / norm).collect()
}

async fn stub_embeddings(
    State(calls): State<Arc<AtomicUsize>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    let text = body["input"][0].as_str().unwrap_or_default();
    Json(json!({ "embeddings": [stub_embed(text)] }))
}

async fn stub_chat(Json(body): Json<Value>) -> Response {
    if body["stream"].as_bool().unwrap_or(false) {
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"hello\"}}]}\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
            "\n",
            "data: [DONE]\n",
            "\n",
        );
        return ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response();
    }

    let prompt = body["messages"][0]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    Json(json!({ "choices": [{ "message": { "content": prompt } }] })).into_response()
}

/// Starts the stub backend; returns its base URL and the embed-call
/// counter.
async fn spawn_stub() -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/embeddings", post(stub_embeddings))
        .route("/chat/completions", post(stub_chat))
        .with_state(calls.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), calls)
}

/// Builds a service wired to the stub, with snapshots confined to
/// `cache_dir`.
async fn make_service(stub_url: &str, cache_dir: &Path) -> Arc<CompletionService> {
    let local = LocalConfig {
        server_url: stub_url.to_string(),
        model_name: String::new(),
        timeout_secs: 30,
        dialect: LocalDialect::Custom,
    };
    let embedder = Embedder::from_local(LocalEmbedder::connect(&local).await.unwrap());
    let llm = CompletionClient::new("test-key", "test-model").with_base_url(stub_url);

    let mut config = Config::default();
    config.snapshot_cache_dir = Some(cache_dir.to_path_buf());

    Arc::new(CompletionService::new(embedder, llm, config).unwrap())
}

fn write_workspace(root: &Path) {
    fs::write(root.join("f1.rs"), F1_CONTENT).unwrap();
    fs::write(root.join("f2.rs"), F2_CONTENT).unwrap();
    fs::write(root.join("f3.rs"), F3_CONTENT).unwrap();
}

/// The inventory key for a workspace file, matching the walker's view
/// of the canonicalized root.
fn inventory_key(root: &Path, name: &str) -> String {
    fs::canonicalize(root).unwrap().join(name).display().to_string()
}

#[tokio::test]
async fn test_completion_on_empty_index_fails() {
    let (stub_url, _) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let service = make_service(&stub_url, cache.path()).await;

    let err = service
        .get_completion("f.rs", "fn main() {")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Vector(VectorError::EmptyIndex)
    ));
}

#[tokio::test]
async fn test_completion_is_conditioned_on_retrieved_context() {
    let (stub_url, _) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace(workspace.path());

    let service = make_service(&stub_url, cache.path()).await;
    service.index_directory(workspace.path()).await.unwrap();
    assert_eq!(service.indexed_documents(), 3);

    // The stub echoes the prompt, so the retrieved context is
    // observable in the completion.
    let completion = service.get_completion("f2.rs", F2_CONTENT).await.unwrap();
    assert!(completion.contains("beta_unique_token_two"));
    assert!(completion.contains("CONTINUATION:"));
}

#[tokio::test]
async fn test_rebuild_after_delete_drops_documents() {
    let (stub_url, _) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace(workspace.path());

    let service = make_service(&stub_url, cache.path()).await;
    service.index_directory(workspace.path()).await.unwrap();
    assert_eq!(service.indexed_documents(), 3);

    service
        .delete_file(&inventory_key(workspace.path(), "f2.rs"))
        .await
        .unwrap();
    assert_eq!(service.indexed_documents(), 2);

    // Even a query aimed straight at f2's content can no longer
    // surface it.
    let completion = service.get_completion("f2.rs", F2_CONTENT).await.unwrap();
    assert!(!completion.contains("beta_unique_token_two"));

    // Deleting an unknown path is a no-op.
    service.delete_file("never/indexed.rs").await.unwrap();
    assert_eq!(service.indexed_documents(), 2);
}

#[tokio::test]
async fn test_cache_short_circuits_unchanged_reindex() {
    let (stub_url, calls) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace(workspace.path());

    let service = make_service(&stub_url, cache.path()).await;
    service.index_directory(workspace.path()).await.unwrap();
    let after_first = calls.load(Ordering::SeqCst);

    // Re-index an unchanged file: chunking happens, embedding does not.
    let f1 = fs::canonicalize(workspace.path()).unwrap().join("f1.rs");
    service.index_file(&f1).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), after_first);
    assert_eq!(service.indexed_documents(), 3);
}

#[tokio::test]
async fn test_snapshot_reload_skips_walk_and_preserves_results() {
    let (stub_url, calls) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace(workspace.path());

    let first = make_service(&stub_url, cache.path()).await;
    first.index_directory(workspace.path()).await.unwrap();
    let completion_before = first.get_completion("f1.rs", F1_CONTENT).await.unwrap();

    // Remove the source files: if the restarted service walked the
    // workspace instead of loading the snapshot, it would find nothing.
    fs::remove_file(workspace.path().join("f1.rs")).unwrap();
    fs::remove_file(workspace.path().join("f2.rs")).unwrap();
    fs::remove_file(workspace.path().join("f3.rs")).unwrap();

    let second = make_service(&stub_url, cache.path()).await;
    let after_connect = calls.load(Ordering::SeqCst);
    second.index_directory(workspace.path()).await.unwrap();

    // Snapshot load embeds nothing.
    assert_eq!(calls.load(Ordering::SeqCst), after_connect);
    assert_eq!(second.indexed_documents(), 3);

    let completion_after = second.get_completion("f1.rs", F1_CONTENT).await.unwrap();
    assert_eq!(completion_after, completion_before);
}

#[tokio::test]
async fn test_streaming_completion_delivers_tokens_then_closes() {
    let (stub_url, _) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace(workspace.path());

    let service = make_service(&stub_url, cache.path()).await;
    service.index_directory(workspace.path()).await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    service
        .get_completion_stream("f1.rs", F1_CONTENT, tx)
        .await;

    let mut tokens = Vec::new();
    while let Some(token) = rx.recv().await {
        tokens.push(token);
    }
    assert_eq!(tokens.join(""), "hello world");
}

#[tokio::test]
async fn test_streaming_completion_closes_channel_on_empty_index() {
    let (stub_url, _) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let service = make_service(&stub_url, cache.path()).await;

    let (tx, mut rx) = mpsc::channel(16);
    service.get_completion_stream("f.rs", "fn x(", tx).await;

    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_http_surface_end_to_end() {
    let (stub_url, _) = spawn_stub().await;
    let cache = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace(workspace.path());

    let service = make_service(&stub_url, cache.path()).await;
    let app = server::router(service.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();

    // Health.
    let response = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Autocomplete backend is running!");

    // Missing query params are a 400.
    let response = client.get(format!("{base}/complete")).send().await.unwrap();
    assert_eq!(response.status(), 400);

    // Indexing returns immediately and completes in the background.
    let response = client
        .post(format!("{base}/index"))
        .json(&json!({ "path": workspace.path().display().to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let mut indexed = false;
    for _ in 0..100 {
        if service.indexed_documents() == 3 {
            indexed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(indexed, "background indexing never completed");

    // A completion conditioned on the indexed workspace.
    let response = client
        .get(format!("{base}/complete"))
        .query(&[("file_path", "f3.rs"), ("content", F3_CONTENT)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["completion"]
        .as_str()
        .unwrap()
        .contains("gamma_unique_token_three"));

    // Synchronous delete.
    let response = client
        .delete(format!("{base}/index-file"))
        .json(&json!({ "path": inventory_key(workspace.path(), "f3.rs") }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(service.indexed_documents(), 2);
}
