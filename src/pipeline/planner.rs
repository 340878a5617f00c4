//! Planner stage: user prompt → [`Plan`].

use std::sync::Arc;

use super::PipelineError;
use crate::agent::prompt::planner_prompt;
use crate::agent::truncate_for_log;
use crate::llm::{ChatMessage, LlmClient, ResponseFormat};
use crate::plan::{extract_json, Plan};

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, model: &str) -> Self {
        Self {
            llm,
            model: model.to_string(),
        }
    }

    /// One structured request; no retry at this layer.
    pub async fn plan(&self, user_prompt: &str) -> Result<Plan, PipelineError> {
        tracing::info!("Planner started: {}", truncate_for_log(user_prompt, 100));

        let messages = [ChatMessage::user(planner_prompt(user_prompt))];
        let format = ResponseFormat {
            name: "plan".to_string(),
            schema: Plan::json_schema(),
        };
        let response = self
            .llm
            .structured_completion(&self.model, &messages, &format)
            .await
            .map_err(|e| PipelineError::Oracle(format!("{e:#}")))?;

        let plan = parse_plan(response.content.as_deref()).map_err(|reason| {
            tracing::error!("Planner did not return a valid plan: {}", reason);
            PipelineError::PlanningFailed(reason)
        })?;

        tracing::info!(
            "Plan created: '{}' with {} files",
            plan.name,
            plan.files.len()
        );
        Ok(plan)
    }
}

fn parse_plan(content: Option<&str>) -> Result<Plan, String> {
    let content = content.ok_or_else(|| "empty response".to_string())?;
    let json =
        extract_json(content).ok_or_else(|| "response contained no JSON object".to_string())?;
    let plan: Plan = serde_json::from_str(json).map_err(|e| format!("malformed plan: {e}"))?;
    plan.validate()?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_plan() {
        let raw = r#"{"name":"Calc","description":"d","techstack":"html",
            "features":["add"],"files":[{"path":"index.html","purpose":"markup"}]}"#;
        let plan = parse_plan(Some(raw)).unwrap();
        assert_eq!(plan.files[0].path, "index.html");
    }

    #[test]
    fn rejects_unusable_replies() {
        assert_eq!(parse_plan(None).unwrap_err(), "empty response");
        assert!(parse_plan(Some("I cannot help with that")).is_err());
        assert!(parse_plan(Some(r#"{"name":"Calc"}"#))
            .unwrap_err()
            .starts_with("malformed plan"));
        let no_files =
            r#"{"name":"Calc","description":"d","techstack":"html","features":[],"files":[]}"#;
        assert_eq!(parse_plan(Some(no_files)).unwrap_err(), "plan lists no files");
    }
}
