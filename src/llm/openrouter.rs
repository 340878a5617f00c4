//! OpenAI-compatible chat completions client (OpenRouter by default).

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ChatMessage, ChatResponse, LlmClient, ResponseFormat, ToolCall, ToolSchema};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// HTTP client for `{base_url}/chat/completions`.
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    temperature: Option<f32>,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionBody {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request: &ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let resp = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to call chat completions API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions API error {status}: {body}");
        }

        let body: CompletionBody = resp
            .json()
            .await
            .context("Failed to parse chat completions response")?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Chat completions response had no choices"))?;

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls,
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> anyhow::Result<ChatResponse> {
        let request = ChatRequest {
            model,
            messages,
            tools: tools.filter(|t| !t.is_empty()),
            response_format: None,
            temperature: self.temperature,
        };
        self.send(&request).await
    }

    async fn structured_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: &ResponseFormat,
    ) -> anyhow::Result<ChatResponse> {
        let request = ChatRequest {
            model,
            messages,
            tools: None,
            response_format: Some(json!({
                "type": "json_schema",
                "json_schema": {
                    "name": format.name,
                    "strict": true,
                    "schema": format.schema,
                }
            })),
            temperature: self.temperature,
        };
        self.send(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn base_url_is_normalized() {
        let client =
            OpenRouterClient::new("key".to_string()).with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.completions_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn structured_request_shape() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            tools: None,
            response_format: Some(json!({"type": "json_schema"})),
            temperature: Some(0.5),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn parses_tool_call_reply() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"call_1","type":"function",
            "function":{"name":"write_file","arguments":"{\"path\":\"a\"}"}}]}}]}"#;
        let body: CompletionBody = serde_json::from_str(raw).unwrap();
        let message = &body.choices[0].message;
        assert!(message.content.is_none());
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "write_file");

        // Round-tripped into the next request as an assistant turn.
        let turn = ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(calls.clone()),
            tool_call_id: None,
        };
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["tool_calls"][0]["type"], "function");
    }
}
