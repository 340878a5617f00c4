//! Architect stage: [`Plan`] → ordered [`TaskPlan`].

use std::sync::Arc;

use super::PipelineError;
use crate::agent::prompt::architect_prompt;
use crate::llm::{ChatMessage, LlmClient, ResponseFormat};
use crate::plan::{extract_json, Plan, TaskPlan};

pub struct Architect {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl Architect {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }

    /// One structured request; the plan back-reference is attached here
    /// rather than trusted from the oracle.
    pub async fn architect(&self, plan: &Plan) -> Result<TaskPlan, PipelineError> {
        tracing::info!("Architect started for '{}'", plan.name);

        let plan_json = serde_json::to_string_pretty(plan)
            .map_err(|e| PipelineError::ArchitectingFailed(format!("cannot serialize plan: {e}")))?;
        let messages = [ChatMessage::user(architect_prompt(&plan_json))];
        let format = ResponseFormat {
            name: "task_plan".to_string(),
            schema: TaskPlan::json_schema(),
        };
        let response = self
            .llm
            .structured_completion(&self.model, &messages, &format)
            .await
            .map_err(|e| PipelineError::Oracle(format!("{e:#}")))?;

        let mut task_plan = parse_task_plan(response.content.as_deref()).map_err(|reason| {
            tracing::error!("Architect did not return a valid task plan: {}", reason);
            PipelineError::ArchitectingFailed(reason)
        })?;
        task_plan.plan = Some(plan.clone());

        tracing::info!(
            "Task plan created with {} steps: {}",
            task_plan.implementation_steps.len(),
            task_plan.planned_files().join(", ")
        );
        Ok(task_plan)
    }
}

fn parse_task_plan(content: Option<&str>) -> Result<TaskPlan, String> {
    let content = content.ok_or_else(|| "empty response".to_string())?;
    let json =
        extract_json(content).ok_or_else(|| "response contained no JSON object".to_string())?;
    let task_plan: TaskPlan =
        serde_json::from_str(json).map_err(|e| format!("malformed task plan: {e}"))?;
    task_plan.validate()?;
    Ok(task_plan)
}
