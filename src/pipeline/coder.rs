//! Coder loop controller.
//!
//! A cursor over the task plan: `Running(idx)` executes step `idx` in a fresh
//! tool session, then moves to `Running(idx + 1)` or `Done`. Steps run one at
//! a time in plan order because later files build on earlier ones on disk.

use std::sync::Arc;

use super::{emit, EventSender, PipelineError, PipelineEvent, PipelineSettings};
use crate::agent::prompt::{coder_system_prompt, coder_user_prompt};
use crate::agent::{SessionEnd, ToolSession};
use crate::llm::LlmClient;
use crate::plan::{CoderState, ImplementationTask};
use crate::sandbox::{ProjectRoot, SandboxError};
use crate::tools::ToolRegistry;

/// Position of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderPhase {
    Running(usize),
    Done,
}

impl CoderPhase {
    pub fn of(state: &CoderState) -> Self {
        if state.is_done() {
            Self::Done
        } else {
            Self::Running(state.current_step_idx)
        }
    }
}

/// What happened in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The target file (or at least one file) was written.
    Written { paths: Vec<String> },
    /// The session ended without a successful write.
    NoWrite { reason: String },
    /// The step could not run: bad target path or oracle failure.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub filepath: String,
    pub result: StepResult,
}

impl StepReport {
    pub fn wrote(&self) -> bool {
        matches!(self.result, StepResult::Written { .. })
    }
}

pub struct CoderLoop {
    session: ToolSession,
}

impl CoderLoop {
    pub fn new(session: ToolSession) -> Self {
        Self { session }
    }

    pub fn from_settings(llm: Arc<dyn LlmClient>, settings: &PipelineSettings) -> Self {
        let tools = if settings.shell_tool_enabled {
            ToolRegistry::coder_with_shell(settings.command_timeout_secs)
        } else {
            ToolRegistry::coder()
        };
        Self::new(ToolSession::new(
            llm,
            tools,
            settings.model.clone(),
            settings.max_tool_iterations,
        ))
    }

    /// Drive `state` to `Done`, one step per iteration.
    ///
    /// Only a vanished project root stops the loop early.
    pub async fn run(
        &self,
        state: &mut CoderState,
        root: &ProjectRoot,
        events: Option<&EventSender>,
    ) -> Result<Vec<StepReport>, PipelineError> {
        let mut reports = Vec::new();
        while let CoderPhase::Running(_) = CoderPhase::of(state) {
            reports.push(self.step(state, root, events).await?);
        }
        tracing::info!("All {} implementation steps processed", state.total_steps());
        Ok(reports)
    }

    /// Execute the step at the cursor and advance it.
    pub async fn step(
        &self,
        state: &mut CoderState,
        root: &ProjectRoot,
        events: Option<&EventSender>,
    ) -> Result<StepReport, PipelineError> {
        let index = state.current_step_idx;
        let total = state.total_steps();
        let task = match state.current_task() {
            Some(task) => task.clone(),
            None => {
                return Err(PipelineError::Oracle(
                    "coder step requested after the last step".to_string(),
                ))
            }
        };

        tracing::info!(
            "Processing step {}/{}: {}",
            index + 1,
            total,
            task.filepath
        );
        emit(
            events,
            PipelineEvent::StepStarted {
                index,
                total,
                filepath: task.filepath.clone(),
            },
        );

        // Existing content lets a step extend a file instead of replacing it
        let result = match root.read(&task.filepath).await {
            Ok(existing) => {
                tracing::debug!("Existing content length: {} characters", existing.len());
                state.current_file_content = Some(existing.clone());
                self.implement(&task, &existing, root).await
            }
            // The only error that ends the loop
            Err(e @ SandboxError::RootNotInitialized(_)) => return Err(e.into()),
            Err(e) => StepResult::Failed {
                error: e.to_string(),
            },
        };

        match &result {
            StepResult::Written { paths } => {
                if !paths.iter().any(|p| p == &task.filepath) {
                    tracing::warn!(
                        "Step {} wrote {:?} but not its target {}",
                        index + 1,
                        paths,
                        task.filepath
                    );
                }
                tracing::info!("Step {} completed", index + 1);
            }
            StepResult::NoWrite { reason } => tracing::warn!(
                "Step {} ({}) finished without writing a file: {}",
                index + 1,
                task.filepath,
                reason
            ),
            StepResult::Failed { error } => tracing::warn!(
                "Step {} ({}) failed: {}",
                index + 1,
                task.filepath,
                error
            ),
        }

        let report = StepReport {
            index,
            filepath: task.filepath.clone(),
            result,
        };
        emit(
            events,
            PipelineEvent::StepFinished {
                index,
                filepath: task.filepath,
                wrote: report.wrote(),
            },
        );
        // Advance even when nothing was written
        state.advance();
        Ok(report)
    }

    async fn implement(
        &self,
        task: &ImplementationTask,
        existing: &str,
        root: &ProjectRoot,
    ) -> StepResult {
        let system_prompt = coder_system_prompt(self.session.tools());
        let user_prompt = coder_user_prompt(task, existing);

        match self.session.run(&system_prompt, &user_prompt, root).await {
            Ok(outcome) if outcome.wrote_any() => StepResult::Written {
                paths: outcome.written,
            },
            Ok(outcome) => StepResult::NoWrite {
                reason: match outcome.end {
                    SessionEnd::Final(_) => "model answered without calling write_file".to_string(),
                    SessionEnd::IterationCap => {
                        format!("iteration cap reached after {} iterations", outcome.iterations)
                    }
                    SessionEnd::Empty => "model returned an empty response".to_string(),
                },
            },
            Err(e) => StepResult::Failed {
                error: format!("{e:#}"),
            },
        }
    }
}
