//! Task records and their in-memory store (non-persistent).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{Progress, TaskStatus};

pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// One website build as tracked by the front end.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: Uuid,
    pub user_prompt: String,
    pub status: TaskStatus,
    pub progress: Progress,
    pub current_step: Option<String>,
    pub project_path: Option<PathBuf>,
    pub files: Vec<String>,
    pub missing_files: Vec<String>,
    pub review: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Final results of a completed run.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub files: Vec<String>,
    pub missing_files: Vec<String>,
    pub review: Option<String>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, user_prompt: &str) -> Result<TaskRecord, String>;

    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, String>;

    /// All tasks, oldest first.
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, String>;

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<(), String>;

    async fn update_progress(
        &self,
        id: Uuid,
        progress: Progress,
        current_step: Option<String>,
    ) -> Result<(), String>;

    async fn set_project_path(&self, id: Uuid, path: PathBuf) -> Result<(), String>;

    /// Store results and mark the task completed.
    async fn complete_task(&self, id: Uuid, completion: Completion) -> Result<(), String>;

    /// Returns whether a record was removed.
    async fn delete_task(&self, id: Uuid) -> Result<bool, String>;
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify(&self, id: Uuid, f: impl FnOnce(&mut TaskRecord)) -> Result<(), String> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| format!("Task {} not found", id))?;
        f(&mut *task);
        task.updated_at = now_string();
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, user_prompt: &str) -> Result<TaskRecord, String> {
        let now = now_string();
        let task = TaskRecord {
            id: Uuid::new_v4(),
            user_prompt: user_prompt.to_string(),
            status: TaskStatus::Pending,
            progress: Progress::Initialized,
            current_step: None,
            project_path: None,
            files: vec![],
            missing_files: vec![],
            review: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, String> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, String> {
        let mut tasks: Vec<TaskRecord> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<(), String> {
        self.modify(id, |task| {
            task.status = status;
            task.error = error;
        })
        .await
    }

    async fn update_progress(
        &self,
        id: Uuid,
        progress: Progress,
        current_step: Option<String>,
    ) -> Result<(), String> {
        self.modify(id, |task| {
            task.progress = progress;
            task.current_step = current_step;
        })
        .await
    }

    async fn set_project_path(&self, id: Uuid, path: PathBuf) -> Result<(), String> {
        self.modify(id, |task| task.project_path = Some(path)).await
    }

    async fn complete_task(&self, id: Uuid, completion: Completion) -> Result<(), String> {
        self.modify(id, |task| {
            task.status = TaskStatus::Completed;
            task.progress = Progress::Done;
            task.current_step = None;
            task.files = completion.files;
            task.missing_files = completion.missing_files;
            task.review = completion.review;
            task.error = None;
        })
        .await
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, String> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task("a calculator").await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, Progress::Initialized);

        store
            .update_progress(task.id, Progress::Coder, Some("Step 1/3: index.html".into()))
            .await
            .unwrap();
        store
            .complete_task(
                task.id,
                Completion {
                    files: vec!["index.html".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let done = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, Progress::Done);
        assert_eq!(done.current_step, None);
        assert_eq!(done.files, vec!["index.html"]);

        assert!(store.delete_task(task.id).await.unwrap());
        assert!(!store.delete_task(task.id).await.unwrap());
        assert!(store.get_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn updating_unknown_task_fails() {
        let store = InMemoryTaskStore::new();
        let err = store
            .update_status(Uuid::new_v4(), TaskStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(err.contains("not found"));
    }

    #[tokio::test]
    async fn failure_keeps_cause() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task("x").await.unwrap();
        store
            .update_status(task.id, TaskStatus::Failed, Some("Planning failed: empty".into()))
            .await
            .unwrap();
        let failed = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(failed.error.as_deref(), Some("Planning failed: empty"));
        assert_eq!(store.list_tasks().await.unwrap().len(), 1);
    }
}
