//! HTTP surface: four endpoints on a loopback listener.
//!
//! `/index` and `/index-file` hand their work to a background task
//! and return immediately; a client disconnect does not abort the
//! running index job. `DELETE /index-file` and `/complete` run on the
//! request task to completion.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::completion::CompletionService;

#[derive(Clone)]
struct AppState {
    service: Arc<CompletionService>,
}

/// Builds the application router. Separated from [`serve`] so tests
/// can drive the routes without binding a socket.
pub fn router(service: Arc<CompletionService>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/index", post(index_directory))
        .route("/index-file", post(index_file).delete(delete_file))
        .route("/complete", get(complete))
        .with_state(AppState { service })
}

/// Binds the loopback listener and serves until ctrl-c.
pub async fn serve(service: Arc<CompletionService>, port: u16) -> anyhow::Result<()> {
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("server listening on http://{addr}");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");
    info!("received shutdown signal");
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "Autocomplete backend is running!" }))
}

#[derive(Debug, Deserialize)]
struct PathBody {
    #[serde(default)]
    path: String,
}

async fn index_directory(
    State(state): State<AppState>,
    Json(body): Json<PathBody>,
) -> (StatusCode, Json<Value>) {
    // An empty path means the process working directory.
    let path = if body.path.is_empty() {
        match std::env::current_dir() {
            Ok(cwd) => cwd.display().to_string(),
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Could not get working directory" })),
                );
            }
        }
    } else {
        body.path
    };

    let service = state.service.clone();
    let job_path = path.clone();
    tokio::spawn(async move {
        match service.index_directory(Path::new(&job_path)).await {
            Ok(()) => info!(path = %job_path, "async directory indexing completed"),
            Err(e) => error!(path = %job_path, "async directory indexing failed: {e}"),
        }
    });

    (
        StatusCode::OK,
        Json(json!({ "message": format!("Indexing started for directory: {path}") })),
    )
}

async fn index_file(
    State(state): State<AppState>,
    Json(body): Json<PathBody>,
) -> (StatusCode, Json<Value>) {
    let service = state.service.clone();
    let job_path = body.path.clone();
    tokio::spawn(async move {
        match service.index_file(Path::new(&job_path)).await {
            Ok(()) => info!(path = %job_path, "async file indexing completed"),
            Err(e) => error!(path = %job_path, "async file indexing failed: {e}"),
        }
    });

    (
        StatusCode::OK,
        Json(json!({ "message": format!("Indexing started for file: {}", body.path) })),
    )
}

async fn delete_file(
    State(state): State<AppState>,
    Json(body): Json<PathBody>,
) -> (StatusCode, Json<Value>) {
    match state.service.delete_file(&body.path).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": format!("Deletion completed for file: {}", body.path) })),
        ),
        Err(e) => {
            error!(path = %body.path, "failed to delete file: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompleteParams {
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    content: String,
}

async fn complete(
    State(state): State<AppState>,
    Query(params): Query<CompleteParams>,
) -> (StatusCode, Json<Value>) {
    if params.file_path.is_empty() || params.content.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "file_path and content are required" })),
        );
    }

    match state
        .service
        .get_completion(&params.file_path, &params.content)
        .await
    {
        Ok(completion) => (StatusCode::OK, Json(json!({ "completion": completion }))),
        Err(e) => {
            error!("failed to get completion: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate completion" })),
            )
        }
    }
}
