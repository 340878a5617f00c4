//! Planner → architect → coder loop → (reviewer) pipeline.
//!
//! Stages run strictly in series against one [`ProjectRoot`]. Planner and
//! architect failures abort the run; anomalies inside individual coder steps
//! are logged and the loop moves on, so a run that completes may still have
//! produced fewer files than planned (see [`RunOutcome::missing_files`]).

mod architect;
mod coder;
mod planner;
mod reviewer;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::plan::{CoderState, Plan, TaskPlan};
use crate::sandbox::{allocate_root, ProjectRoot, SandboxError};

pub use architect::Architect;
pub use coder::{CoderLoop, CoderPhase, StepReport, StepResult};
pub use planner::Planner;
pub use reviewer::{Reviewer, NOTHING_TO_REVIEW};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Architecting failed: {0}")]
    ArchitectingFailed(String),

    #[error("Text-generation request failed: {0}")]
    Oracle(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Coarse position of a run, as reported to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planner,
    Architect,
    Coder,
    Reviewer,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Planner => write!(f, "planner"),
            Stage::Architect => write!(f, "architect"),
            Stage::Coder => write!(f, "coder"),
            Stage::Reviewer => write!(f, "reviewer"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StageStarted(Stage),
    StepStarted {
        index: usize,
        total: usize,
        filepath: String,
    },
    StepFinished {
        index: usize,
        filepath: String,
        wrote: bool,
    },
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

fn emit(events: Option<&EventSender>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Knobs shared by every run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    /// Parent directory of the `generated_project_<N>` roots.
    pub workspace_path: PathBuf,
    pub max_tool_iterations: usize,
    pub review_enabled: bool,
    pub shell_tool_enabled: bool,
    pub command_timeout_secs: u64,
    pub review_preview_chars: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.default_model.clone(),
            workspace_path: config.workspace_path.clone(),
            max_tool_iterations: config.max_iterations,
            review_enabled: config.review_enabled,
            shell_tool_enabled: config.shell_tool_enabled,
            command_timeout_secs: config.command_timeout_secs,
            review_preview_chars: config.review_preview_chars,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub root: ProjectRoot,
    pub plan: Plan,
    pub coder_state: CoderState,
    pub steps: Vec<StepReport>,
    /// Files on disk under the root after the coder finished.
    pub files: Vec<String>,
    /// Files named by the task plan that do not exist on disk.
    pub missing_files: Vec<String>,
    pub review: Option<String>,
}

/// A run started in the background.
pub struct RunHandle {
    pub root: ProjectRoot,
    pub join: JoinHandle<Result<RunOutcome, PipelineError>>,
}

/// The website generation pipeline.
pub struct Pipeline {
    llm: Arc<dyn LlmClient>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn LlmClient>, settings: PipelineSettings) -> Self {
        Self { llm, settings }
    }

    /// Build a pipeline backed by the configured chat completions endpoint.
    pub fn from_config(config: &Config) -> Self {
        let llm = OpenRouterClient::new(config.api_key.clone())
            .with_base_url(&config.llm_base_url)
            .with_temperature(config.temperature);
        Self::new(Arc::new(llm), PipelineSettings::from_config(config))
    }

    /// Allocate a fresh project root for a run.
    pub async fn allocate_root(&self) -> Result<ProjectRoot, PipelineError> {
        Ok(allocate_root(&self.settings.workspace_path).await?)
    }

    /// Allocate a root and run the pipeline on it in the background.
    ///
    /// The root is known as soon as this returns; the outcome arrives through
    /// the join handle.
    pub async fn start(
        self: &Arc<Self>,
        user_prompt: String,
        events: Option<EventSender>,
    ) -> Result<RunHandle, PipelineError> {
        let root = self.allocate_root().await?;
        let pipeline = Arc::clone(self);
        let run_root = root.clone();
        let join = tokio::spawn(async move {
            pipeline
                .run(&user_prompt, &run_root, events.as_ref())
                .await
        });
        Ok(RunHandle { root, join })
    }

    /// Run every stage against `root`.
    pub async fn run(
        &self,
        user_prompt: &str,
        root: &ProjectRoot,
        events: Option<&EventSender>,
    ) -> Result<RunOutcome, PipelineError> {
        tracing::info!("Starting pipeline run in {}", root.path().display());

        emit(events, PipelineEvent::StageStarted(Stage::Planner));
        let plan = Planner::new(Arc::clone(&self.llm), &self.settings.model)
            .plan(user_prompt)
            .await?;

        emit(events, PipelineEvent::StageStarted(Stage::Architect));
        let task_plan: TaskPlan = Architect::new(Arc::clone(&self.llm), &self.settings.model)
            .architect(&plan)
            .await?;

        emit(events, PipelineEvent::StageStarted(Stage::Coder));
        let coder = CoderLoop::from_settings(Arc::clone(&self.llm), &self.settings);
        let mut coder_state = CoderState::new(task_plan);
        let steps = coder.run(&mut coder_state, root, events).await?;

        let files = root.list(".").await?;
        let missing_files: Vec<String> = coder_state
            .task_plan
            .planned_files()
            .into_iter()
            .filter(|planned| !contains_path(&files, planned))
            .map(ToString::to_string)
            .collect();
        if !missing_files.is_empty() {
            tracing::warn!(
                "Run finished without producing planned files: {}",
                missing_files.join(", ")
            );
        }

        let review = if self.settings.review_enabled {
            emit(events, PipelineEvent::StageStarted(Stage::Reviewer));
            let reviewer = Reviewer::new(
                Arc::clone(&self.llm),
                &self.settings.model,
                self.settings.review_preview_chars,
            );
            Some(reviewer.review(&coder_state, root).await?)
        } else {
            None
        };

        emit(events, PipelineEvent::StageStarted(Stage::Done));
        tracing::info!(
            "Pipeline run finished: {} files, {} missing",
            files.len(),
            missing_files.len()
        );

        Ok(RunOutcome {
            root: root.clone(),
            plan,
            coder_state,
            steps,
            files,
            missing_files,
            review,
        })
    }
}

/// Compare a planned path with listed paths, ignoring `./` and leading `/`.
fn contains_path(files: &[String], planned: &str) -> bool {
    let planned = normalize(planned);
    files.iter().any(|f| f == &planned)
}

fn normalize(path: &str) -> String {
    path.trim()
        .trim_start_matches('/')
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_paths_match_listing_loosely() {
        let files = vec!["css/styles.css".to_string(), "index.html".to_string()];
        assert!(contains_path(&files, "./index.html"));
        assert!(contains_path(&files, "/css//styles.css"));
        assert!(!contains_path(&files, "script.js"));
    }

    #[test]
    fn stage_display_matches_serde() {
        let stages = [
            Stage::Planner,
            Stage::Architect,
            Stage::Coder,
            Stage::Reviewer,
            Stage::Done,
        ];
        for stage in stages {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, stage.to_string());
        }
    }
}
