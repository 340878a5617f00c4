//! Router and server setup.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::task_store::{InMemoryTaskStore, TaskStore};
use super::tasks;
use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared state of every handler.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            tasks: Arc::new(InMemoryTaskStore::new()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(tasks::health))
        .route("/api/build-website", post(tasks::build_website))
        .route("/api/status/:task_id", get(tasks::task_status))
        .route("/api/result/:task_id", get(tasks::task_result))
        .route("/api/download/:task_id", get(tasks::download_project))
        .route("/api/file/:task_id/*file_path", get(tasks::get_file))
        .route("/api/task/:task_id", delete(tasks::delete_task))
        .route("/api/tasks", get(tasks::list_tasks))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.workspace_path).await?;
    let state = Arc::new(AppState::new(Pipeline::from_config(&config)));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        "Serving on http://{} (workspace {})",
        addr,
        config.workspace_path.display()
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}
