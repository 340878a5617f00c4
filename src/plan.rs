//! Plan model shared by the pipeline stages.
//!
//! `Plan` and `TaskPlan` are produced by the oracle through structured
//! output, so they are also a deserialization boundary: unknown fields are
//! rejected and [`Plan::validate`] / [`TaskPlan::validate`] reject records that
//! parse but are unusable.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One file the plan intends to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    pub path: String,
    pub purpose: String,
}

/// High-level project description produced by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub name: String,
    pub description: String,
    pub techstack: String,
    pub features: Vec<String>,
    pub files: Vec<FileSpec>,
}

impl Plan {
    /// Check the fields the architect depends on.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("plan has an empty name".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("plan has an empty description".to_string());
        }
        if self.techstack.trim().is_empty() {
            return Err("plan has an empty techstack".to_string());
        }
        if self.files.is_empty() {
            return Err("plan lists no files".to_string());
        }
        for file in &self.files {
            if file.path.trim().is_empty() {
                return Err(format!("plan file with purpose '{}' has no path", file.purpose));
            }
            if file.purpose.trim().is_empty() {
                return Err(format!("plan file '{}' has no purpose", file.path));
            }
        }
        Ok(())
    }

    /// JSON schema handed to the oracle for structured output.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["name", "description", "techstack", "features", "files"],
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the app to be built"
                },
                "description": {
                    "type": "string",
                    "description": "One-line description of the app"
                },
                "techstack": {
                    "type": "string",
                    "description": "Technologies used, e.g. 'HTML, CSS, JavaScript'"
                },
                "features": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Features the app must have"
                },
                "files": {
                    "type": "array",
                    "description": "Every file to create",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["path", "purpose"],
                        "properties": {
                            "path": {
                                "type": "string",
                                "description": "Project-relative path, e.g. 'index.html'"
                            },
                            "purpose": {
                                "type": "string",
                                "description": "What the file is responsible for"
                            }
                        }
                    }
                }
            }
        })
    }
}

/// One unit of coding work, scoped to exactly one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImplementationTask {
    pub filepath: String,
    pub task_description: String,
}

/// Ordered work queue for the coder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskPlan {
    /// Originating plan, attached by the architect stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    pub implementation_steps: Vec<ImplementationTask>,
}

impl TaskPlan {
    pub fn validate(&self) -> Result<(), String> {
        if self.implementation_steps.is_empty() {
            return Err("task plan has no implementation steps".to_string());
        }
        for (idx, step) in self.implementation_steps.iter().enumerate() {
            if step.filepath.trim().is_empty() {
                return Err(format!("implementation step {} has no file path", idx + 1));
            }
            if step.task_description.trim().is_empty() {
                return Err(format!(
                    "implementation step {} ({}) has no description",
                    idx + 1,
                    step.filepath
                ));
            }
        }
        Ok(())
    }

    /// Distinct target paths in first-seen order.
    pub fn planned_files(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for step in &self.implementation_steps {
            if !seen.contains(&step.filepath.as_str()) {
                seen.push(step.filepath.as_str());
            }
        }
        seen
    }

    /// Schema for the architect's structured output. The back-reference to
    /// the plan is not requested from the oracle.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["implementation_steps"],
            "properties": {
                "implementation_steps": {
                    "type": "array",
                    "description": "Ordered steps; structure first, then styling, then behaviour",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["filepath", "task_description"],
                        "properties": {
                            "filepath": {
                                "type": "string",
                                "description": "Project-relative path of the file this step implements"
                            },
                            "task_description": {
                                "type": "string",
                                "description": "Self-contained description naming concrete ids, classes and functions"
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Progress cursor of the coder loop.
///
/// `current_step_idx` stays within `0..=len`; reaching `len` means done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoderState {
    pub task_plan: TaskPlan,
    pub current_step_idx: usize,
    #[serde(default)]
    pub current_file_content: Option<String>,
}

impl CoderState {
    pub fn new(task_plan: TaskPlan) -> Self {
        Self {
            task_plan,
            current_step_idx: 0,
            current_file_content: None,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.task_plan.implementation_steps.len()
    }

    pub fn is_done(&self) -> bool {
        self.current_step_idx >= self.total_steps()
    }

    /// Task at the cursor, `None` once done.
    pub fn current_task(&self) -> Option<&ImplementationTask> {
        self.task_plan.implementation_steps.get(self.current_step_idx)
    }

    /// Move the cursor forward by one step, saturating at the end.
    pub fn advance(&mut self) {
        if !self.is_done() {
            self.current_step_idx += 1;
        }
        self.current_file_content = None;
    }
}

/// Pull a JSON object out of an oracle reply that may be wrapped in a
/// markdown code fence or surrounded by prose.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}
