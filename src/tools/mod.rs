//! Tools the coder session may call, each backed by the sandbox.

mod file_ops;
mod terminal;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionSchema, ToolSchema};
use crate::sandbox::ProjectRoot;

pub use file_ops::{GetCurrentDirectory, ListFiles, ReadFile, WriteFile};
pub use terminal::RunCommand;

/// Name of the tool whose successful use marks a coder step as productive.
pub const WRITE_TOOL: &str = "write_file";

/// Cap on tool output fed back to the model.
const MAX_OUTPUT_LEN: usize = 10_000;

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, root: &ProjectRoot) -> anyhow::Result<String>;
}

/// Name and description, for prompts.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Ordered set of tools keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// File tools available to every coder step.
    pub fn coder() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ReadFile));
        registry.register(Box::new(WriteFile));
        registry.register(Box::new(ListFiles));
        registry.register(Box::new(GetCurrentDirectory));
        registry
    }

    /// Coder tools plus the shell escape hatch.
    pub fn coder_with_shell(default_timeout_secs: u64) -> Self {
        let mut registry = Self::coder();
        registry.register(Box::new(RunCommand::new(default_timeout_secs)));
        registry
    }

    /// Add a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolSchema {
                kind: "function".to_string(),
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Run a tool by name. Output is truncated for the model's context.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        root: &ProjectRoot,
    ) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        let mut output = tool.execute(args, root).await?;
        if output.len() > MAX_OUTPUT_LEN {
            let mut end = MAX_OUTPUT_LEN;
            while !output.is_char_boundary(end) {
                end -= 1;
            }
            output.truncate(end);
            output.push_str("\n... [output truncated]");
        }
        Ok(output)
    }
}

/// Fetch a required string argument.
fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}
