//! Terminal/shell command execution tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::sandbox::{ProjectRoot, SandboxError};

/// Run a shell command inside the project directory.
pub struct RunCommand {
    default_timeout_secs: u64,
}

impl RunCommand {
    pub fn new(default_timeout_secs: u64) -> Self {
        Self {
            default_timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the project directory (or a subdirectory of it). Returns the exit code, stdout and stderr."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Project-relative working directory (default: project root)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, root: &ProjectRoot) -> anyhow::Result<String> {
        let command = required_str(&args, "command")?;
        let cwd = args["cwd"].as_str();
        let timeout_secs = args["timeout_secs"]
            .as_u64()
            .unwrap_or(self.default_timeout_secs);

        let output = match root.run_command(command, cwd, timeout_secs).await {
            Ok(output) => output,
            // A timeout is a result the model can react to, not a tool failure.
            Err(SandboxError::Timeout(secs)) => {
                return Ok(format!(
                    "Exit code: timeout\nCommand timed out after {} seconds",
                    secs
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let mut result = format!("Exit code: {}\n", output.exit_code);
        if !output.stdout.is_empty() {
            result.push_str("\n--- stdout ---\n");
            result.push_str(&output.stdout);
        }
        if !output.stderr.is_empty() {
            result.push_str("\n--- stderr ---\n");
            result.push_str(&output.stderr);
        }
        Ok(result)
    }
}
