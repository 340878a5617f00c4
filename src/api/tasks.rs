//! Task handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::archive::zip_root;
use super::routes::AppState;
use super::task_store::{Completion, TaskRecord};
use super::types::*;
use crate::pipeline::PipelineEvent;
use crate::sandbox::{ProjectRoot, SandboxError};

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

async fn load_task(state: &AppState, task_id: Uuid) -> ApiResult<TaskRecord> {
    state
        .tasks
        .get_task(task_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Task {} not found", task_id)))
}

async fn load_completed(state: &AppState, task_id: Uuid) -> ApiResult<TaskRecord> {
    let task = load_task(state, task_id).await?;
    if task.status != TaskStatus::Completed {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Task {} is not completed yet", task_id),
        ));
    }
    Ok(task)
}

fn open_root(task: &TaskRecord) -> ApiResult<ProjectRoot> {
    let path = task.project_path.as_ref().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            "Task has no project directory".to_string(),
        )
    })?;
    ProjectRoot::open(path).map_err(|e| match e {
        SandboxError::RootNotInitialized(_) => (
            StatusCode::NOT_FOUND,
            "Project directory no longer exists".to_string(),
        ),
        other => internal_error(other),
    })
}

fn display_path(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.display().to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Website builder API is running".to_string(),
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Accept a build and run it in the background.
pub async fn build_website(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BuildRequest>,
) -> ApiResult<Json<BuildResponse>> {
    let prompt = req.user_prompt.trim();
    if prompt.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "user_prompt cannot be empty".to_string(),
        ));
    }

    let task = state
        .tasks
        .create_task(prompt)
        .await
        .map_err(internal_error)?;
    tracing::info!("Accepted build {}", task.id);

    tokio::spawn(run_task(Arc::clone(&state), task.id, prompt.to_string()));

    Ok(Json(BuildResponse {
        task_id: task.id,
        status: task.status,
        message: "Website generation started".to_string(),
    }))
}

/// Drive one pipeline run and mirror its progress into the task store.
async fn run_task(state: Arc<AppState>, task_id: Uuid, prompt: String) {
    if let Err(e) = drive(&state, task_id, prompt).await {
        tracing::error!("Build {} failed: {}", task_id, e);
        if let Err(store_err) = state
            .tasks
            .update_status(task_id, TaskStatus::Failed, Some(e))
            .await
        {
            tracing::warn!("Could not record failure of {}: {}", task_id, store_err);
        }
    }
}

async fn drive(state: &AppState, task_id: Uuid, prompt: String) -> Result<(), String> {
    let tasks = &state.tasks;
    tasks
        .update_status(task_id, TaskStatus::Processing, None)
        .await?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = state
        .pipeline
        .start(prompt, Some(tx))
        .await
        .map_err(|e| e.to_string())?;
    tasks
        .set_project_path(task_id, handle.root.path().to_path_buf())
        .await?;

    // The channel closes when the run finishes and drops its sender.
    while let Some(event) = rx.recv().await {
        let (progress, step) = match event {
            PipelineEvent::StageStarted(stage) => (Progress::from(stage), None),
            PipelineEvent::StepStarted {
                index,
                total,
                filepath,
            } => (
                Progress::Coder,
                Some(format!("Step {}/{}: {}", index + 1, total, filepath)),
            ),
            PipelineEvent::StepFinished { .. } => continue,
        };
        tasks.update_progress(task_id, progress, step).await?;
    }

    let outcome = handle
        .join
        .await
        .map_err(|e| format!("pipeline task aborted: {e}"))?
        .map_err(|e| e.to_string())?;

    tasks
        .complete_task(
            task_id,
            Completion {
                files: outcome.files,
                missing_files: outcome.missing_files,
                review: outcome.review,
            },
        )
        .await?;
    tracing::info!("Build {} completed", task_id);
    Ok(())
}

pub async fn task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let task = load_task(&state, task_id).await?;
    Ok(Json(StatusResponse {
        task_id: task.id,
        user_prompt: task.user_prompt,
        status: task.status,
        progress: task.progress,
        current_step: task.current_step,
        project_path: display_path(&task.project_path),
        error: task.error,
        created_at: task.created_at,
        updated_at: task.updated_at,
    }))
}

pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<ResultResponse>> {
    let task = load_completed(&state, task_id).await?;
    Ok(Json(ResultResponse {
        task_id: task.id,
        status: task.status,
        project_path: display_path(&task.project_path),
        file_count: task.files.len(),
        files: task.files,
        missing_files: task.missing_files,
        review: task.review,
    }))
}

pub async fn download_project(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Response> {
    let task = load_completed(&state, task_id).await?;
    let root = open_root(&task)?;
    let bytes = zip_root(&root).await.map_err(|e| internal_error(format!("{e:#}")))?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=website_{}.zip", task_id),
        ),
    ];
    Ok((headers, bytes).into_response())
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((task_id, file_path)): Path<(Uuid, String)>,
) -> ApiResult<Json<FileContentResponse>> {
    let task = load_completed(&state, task_id).await?;
    let root = open_root(&task)?;

    let sandbox_error = |e: SandboxError| match e {
        SandboxError::PathEscape(_) => (StatusCode::FORBIDDEN, e.to_string()),
        other => internal_error(other),
    };
    if !root.is_file(&file_path).await.map_err(sandbox_error)? {
        return Err((
            StatusCode::NOT_FOUND,
            format!("File {} not found", file_path),
        ));
    }
    let content = root.read(&file_path).await.map_err(sandbox_error)?;

    Ok(Json(FileContentResponse { file_path, content }))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    let task = load_task(&state, task_id).await?;
    if task.status.is_active() {
        return Err((
            StatusCode::CONFLICT,
            "Cannot delete a task that is still processing".to_string(),
        ));
    }

    if let Some(path) = &task.project_path {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => tracing::info!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(internal_error(e)),
        }
    }
    state
        .tasks
        .delete_task(task_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(DeleteResponse {
        task_id,
        message: "Task deleted".to_string(),
    }))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> ApiResult<Json<TaskListResponse>> {
    let tasks: Vec<TaskSummary> = state
        .tasks
        .list_tasks()
        .await
        .map_err(internal_error)?
        .into_iter()
        .map(|t| TaskSummary {
            task_id: t.id,
            status: t.status,
            created_at: t.created_at,
        })
        .collect();
    Ok(Json(TaskListResponse {
        total_tasks: tasks.len(),
        tasks,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{
        ChatMessage, ChatResponse, FunctionCall, LlmClient, ResponseFormat, ToolCall, ToolSchema,
    };
    use crate::pipeline::{Pipeline, PipelineSettings};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Plans `index.html` + `styles.css` and writes whatever file a coder
    /// step asks for. With `fail_planning` the plan reply is unusable.
    struct SiteOracle {
        fail_planning: bool,
    }

    #[async_trait]
    impl LlmClient for SiteOracle {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            if messages.len() > 2 {
                return Ok(ChatResponse {
                    content: Some("Implemented.".to_string()),
                    tool_calls: None,
                });
            }
            let target = messages[1]
                .content
                .as_deref()
                .and_then(|c| c.lines().find_map(|l| l.strip_prefix("File: ")))
                .unwrap_or_default()
                .to_string();
            Ok(ChatResponse {
                content: None,
                tool_calls: Some(vec![ToolCall {
                    id: "w".to_string(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: "write_file".to_string(),
                        arguments: serde_json::json!({"path": target, "content": "/* ok */"})
                            .to_string(),
                    },
                }]),
            })
        }

        async fn structured_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            format: &ResponseFormat,
        ) -> anyhow::Result<ChatResponse> {
            let content = match (format.name.as_str(), self.fail_planning) {
                ("plan", true) => "I'd rather not.".to_string(),
                ("plan", false) => serde_json::json!({
                    "name": "Landing",
                    "description": "A landing page",
                    "techstack": "HTML, CSS",
                    "features": ["hero"],
                    "files": [
                        {"path": "index.html", "purpose": "markup"},
                        {"path": "styles.css", "purpose": "styling"}
                    ]
                })
                .to_string(),
                _ => serde_json::json!({
                    "implementation_steps": [
                        {"filepath": "index.html", "task_description": "markup"},
                        {"filepath": "styles.css", "task_description": "styles"}
                    ]
                })
                .to_string(),
            };
            Ok(ChatResponse {
                content: Some(content),
                tool_calls: None,
            })
        }
    }

    fn app(workspace: &TempDir, fail_planning: bool) -> Arc<AppState> {
        let settings = PipelineSettings {
            model: "test-model".to_string(),
            workspace_path: workspace.path().to_path_buf(),
            max_tool_iterations: 5,
            review_enabled: false,
            shell_tool_enabled: false,
            command_timeout_secs: 5,
            review_preview_chars: 200,
        };
        let pipeline = Pipeline::new(Arc::new(SiteOracle { fail_planning }), settings);
        Arc::new(AppState::new(pipeline))
    }

    async fn submit(state: &Arc<AppState>, prompt: &str) -> ApiResult<Json<BuildResponse>> {
        build_website(
            State(Arc::clone(state)),
            Json(BuildRequest {
                user_prompt: prompt.to_string(),
            }),
        )
        .await
    }

    async fn wait_until_settled(state: &Arc<AppState>, task_id: Uuid) -> TaskRecord {
        for _ in 0..500 {
            let task = state.tasks.get_task(task_id).await.unwrap().unwrap();
            if !task.status.is_active() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} did not settle");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let ws = TempDir::new().unwrap();
        let state = app(&ws, false);
        let (code, _) = submit(&state, "   ").await.unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(state.tasks.list_tasks().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn build_then_fetch_results() {
        let ws = TempDir::new().unwrap();
        let state = app(&ws, false);

        let accepted = submit(&state, "a landing page").await.unwrap().0;
        assert_eq!(accepted.status, TaskStatus::Pending);

        let task = wait_until_settled(&state, accepted.task_id).await;
        assert_eq!(task.status, TaskStatus::Completed, "{:?}", task.error);

        let status = task_status(State(state.clone()), Path(task.id)).await.unwrap().0;
        assert_eq!(status.user_prompt, "a landing page");
        assert_eq!(status.progress, Progress::Done);
        assert!(status.project_path.unwrap().ends_with("generated_project_1"));

        let result = task_result(State(state.clone()), Path(task.id)).await.unwrap().0;
        assert_eq!(result.files, vec!["index.html", "styles.css"]);
        assert!(result.missing_files.is_empty());
        assert_eq!(result.review, None);

        let file = get_file(State(state.clone()), Path((task.id, "styles.css".to_string())))
            .await
            .unwrap()
            .0;
        assert_eq!(file.content, "/* ok */");

        let (code, _) = get_file(State(state.clone()), Path((task.id, "nope.js".to_string())))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = get_file(
            State(state.clone()),
            Path((task.id, "../../etc/passwd".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(code, StatusCode::FORBIDDEN);

        let response = download_project(State(state.clone()), Path(task.id))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=website_{}.zip", task.id).as_str()
        );

        let listed = list_tasks(State(state.clone())).await.unwrap().0;
        assert_eq!(listed.total_tasks, 1);

        delete_task(State(state.clone()), Path(task.id)).await.unwrap();
        assert!(!ws.path().join("generated_project_1").exists());
        let (code, _) = task_status(State(state.clone()), Path(task.id)).await.unwrap_err();
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_run_records_cause() {
        let ws = TempDir::new().unwrap();
        let state = app(&ws, true);

        let accepted = submit(&state, "anything").await.unwrap().0;
        let task = wait_until_settled(&state, accepted.task_id).await;

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().starts_with("Planning failed"));

        let (code, _) = task_result(State(state.clone()), Path(task.id)).await.unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
        let (code, _) = download_project(State(state.clone()), Path(task.id))
            .await
            .unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn active_task_cannot_be_deleted() {
        let ws = TempDir::new().unwrap();
        let state = app(&ws, false);
        let task = state.tasks.create_task("x").await.unwrap();
        state
            .tasks
            .update_status(task.id, TaskStatus::Processing, None)
            .await
            .unwrap();

        let (code, _) = delete_task(State(state.clone()), Path(task.id)).await.unwrap_err();
        assert_eq!(code, StatusCode::CONFLICT);
    }
}
