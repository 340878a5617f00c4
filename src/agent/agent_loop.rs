//! Bounded tool-using session.

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient, Role, ToolCall};
use crate::sandbox::ProjectRoot;
use crate::tools::{ToolRegistry, WRITE_TOOL};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The model replied without requesting tools.
    Final(String),
    /// The iteration cap was hit while the model was still calling tools.
    IterationCap,
    /// The model returned neither text nor tool calls.
    Empty,
}

/// Summary of one session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub end: SessionEnd,
    pub iterations: usize,
    /// Paths passed to successful `write_file` calls, in call order.
    pub written: Vec<String>,
    pub tool_calls: usize,
}

impl SessionOutcome {
    pub fn wrote_any(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Oracle session that alternates model turns and tool executions against
/// one project root until the model stops calling tools or the cap is hit.
pub struct ToolSession {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    max_iterations: usize,
}

impl ToolSession {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        model: impl Into<String>,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            max_iterations,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the session. Oracle transport errors are returned; tool errors are
    /// fed back to the model as `Error: ...` results.
    pub async fn run(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        root: &ProjectRoot,
    ) -> anyhow::Result<SessionOutcome> {
        let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        let tool_schemas = self.tools.get_tool_schemas();
        let mut written = Vec::new();
        let mut tool_calls_made = 0;

        for iteration in 0..self.max_iterations {
            tracing::debug!("Tool session iteration {}", iteration + 1);

            // Ask the model for the next move
            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await?;

            if let Some(tool_calls) = response.tool_calls.filter(|calls| !calls.is_empty()) {
                // The assistant turn must precede its tool results
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                    tool_call_id: None,
                });

                for tool_call in &tool_calls {
                    tool_calls_made += 1;
                    tracing::debug!(
                        "Calling tool: {} with args: {}",
                        tool_call.function.name,
                        truncate_for_log(&tool_call.function.arguments, 200)
                    );

                    let result = self.execute_tool_call(tool_call, root).await;
                    let result_str = match &result {
                        Ok(output) => {
                            // Only successful writes count
                            if tool_call.function.name == WRITE_TOOL {
                                if let Some(path) = written_path(tool_call) {
                                    written.push(path);
                                }
                            }
                            output.clone()
                        }
                        Err(e) => {
                            tracing::debug!("Tool {} failed: {}", tool_call.function.name, e);
                            // Fed back so the model can retry
                            format!("Error: {}", e)
                        }
                    };

                    messages.push(ChatMessage {
                        role: Role::Tool,
                        content: Some(result_str),
                        tool_calls: None,
                        tool_call_id: Some(tool_call.id.clone()),
                    });
                }
                continue;
            }

            // No tool calls: this is the final answer
            let end = match response.content {
                Some(content) if !content.trim().is_empty() => SessionEnd::Final(content),
                _ => SessionEnd::Empty,
            };
            return Ok(SessionOutcome {
                end,
                iterations: iteration + 1,
                written,
                tool_calls: tool_calls_made,
            });
        }

        // Cap hit
        tracing::warn!(
            "Tool session reached max iterations ({}) without a final answer",
            self.max_iterations
        );
        Ok(SessionOutcome {
            end: SessionEnd::IterationCap,
            iterations: self.max_iterations,
            written,
            tool_calls: tool_calls_made,
        })
    }

    async fn execute_tool_call(
        &self,
        tool_call: &ToolCall,
        root: &ProjectRoot,
    ) -> anyhow::Result<String> {
        let args: serde_json::Value = serde_json::from_str(&tool_call.function.arguments)
            .map_err(|e| anyhow::anyhow!("Invalid tool arguments: {}", e))?;
        self.tools
            .execute(&tool_call.function.name, args, root)
            .await
    }
}

fn written_path(tool_call: &ToolCall) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(&tool_call.function.arguments)
        .ok()?
        .get("path")?
        .as_str()
        .map(ToString::to_string)
}

/// Truncate a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
