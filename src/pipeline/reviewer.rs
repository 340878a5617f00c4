//! Reviewer stage: free-text critique of the produced files.

use std::sync::Arc;

use super::PipelineError;
use crate::agent::prompt::{reviewer_prompt, reviewer_system_prompt};
use crate::llm::{ChatMessage, LlmClient};
use crate::plan::CoderState;
use crate::sandbox::ProjectRoot;

/// Returned without calling the oracle when no planned file has content.
pub const NOTHING_TO_REVIEW: &str = "No files were generated, so there is nothing to review.";

pub struct Reviewer {
    llm: Arc<dyn LlmClient>,
    model: String,
    preview_chars: usize,
}

impl Reviewer {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str, preview_chars: usize) -> Self {
        Self {
            llm,
            model: model.to_string(),
            preview_chars,
        }
    }

    /// Review the files named by the finished task plan.
    pub async fn review(
        &self,
        state: &CoderState,
        root: &ProjectRoot,
    ) -> Result<String, PipelineError> {
        tracing::info!("Reviewer started");

        let mut previews = Vec::new();
        for path in state.task_plan.planned_files() {
            let content = match root.read(path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::debug!("Skipping {} in review: {}", path, e);
                    continue;
                }
            };
            if content.is_empty() {
                continue;
            }
            previews.push((path.to_string(), preview(&content, self.preview_chars)));
        }

        if previews.is_empty() {
            tracing::info!("Reviewer found no files");
            return Ok(NOTHING_TO_REVIEW.to_string());
        }

        let messages = [
            ChatMessage::system(reviewer_system_prompt()),
            ChatMessage::user(reviewer_prompt(&previews)),
        ];
        let response = self
            .llm
            .chat_completion(&self.model, &messages, None)
            .await
            .map_err(|e| PipelineError::Oracle(format!("{e:#}")))?;

        let review = response.content.unwrap_or_default();
        tracing::info!("Review completed ({} characters)", review.len());
        Ok(review)
    }
}

/// First `max_chars` characters, marked when cut.
fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n... (truncated)", &content[..cut]),
        None => content.to_string(),
    }
}
