//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::Stage;

/// Request to generate a website.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRequest {
    /// Natural-language description of the site
    pub user_prompt: String,
}

/// Response after accepting a build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub message: String,
}

/// Task status enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, run not started yet
    Pending,
    /// Pipeline is running
    Processing,
    Completed,
    /// Run aborted; the record carries the cause
    Failed,
}

impl TaskStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Coarse progress of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Progress {
    Initialized,
    Planner,
    Architect,
    Coder,
    Reviewer,
    Done,
}

impl From<Stage> for Progress {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Planner => Self::Planner,
            Stage::Architect => Self::Architect,
            Stage::Coder => Self::Coder,
            Stage::Reviewer => Self::Reviewer,
            Stage::Done => Self::Done,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub task_id: Uuid,
    pub user_prompt: String,
    pub status: TaskStatus,
    pub progress: Progress,
    /// e.g. `Step 2/3: styles.css`
    pub current_step: Option<String>,
    pub project_path: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub project_path: Option<String>,
    pub files: Vec<String>,
    pub file_count: usize,
    /// Planned files that were never written
    pub missing_files: Vec<String>,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileContentResponse {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub total_tasks: usize,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub task_id: Uuid,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub message: String,
    pub status: String,
    pub version: String,
}
