//! Configuration management for sitesmith.
//!
//! Configuration can be set via environment variables (a `.env` file is loaded
//! by the binary before this runs):
//! - `LLM_API_KEY` - Required. Falls back to `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible endpoint. Defaults to OpenRouter.
//! - `DEFAULT_MODEL` - Optional. Defaults to `openai/gpt-4o-mini`.
//! - `LLM_TEMPERATURE` - Optional. Defaults to `0.7`.
//! - `WORKSPACE_PATH` - Optional. Parent of the generated project roots. Defaults to current directory.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `MAX_ITERATIONS` - Optional. Iteration cap of one coder session. Defaults to `25`.
//! - `REVIEW_ENABLED` - Optional. Run the reviewer after the coder. Defaults to `false`.
//! - `SHELL_TOOL_ENABLED` - Optional. Offer `run_command` to the coder. Defaults to `false`.
//! - `COMMAND_TIMEOUT_SECS` - Optional. Default shell timeout. Defaults to `30`.
//! - `REVIEW_PREVIEW_CHARS` - Optional. Per-file preview size for the reviewer. Defaults to `2000`.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::llm::DEFAULT_BASE_URL;

const API_KEY_VARS: [&str; 3] = ["LLM_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Oracle API key
    pub api_key: String,

    /// Base URL of the chat completions API
    pub llm_base_url: String,

    /// Model identifier used by every stage
    pub default_model: String,

    pub temperature: f32,

    /// Directory holding the `generated_project_<N>` roots
    pub workspace_path: PathBuf,

    pub host: String,
    pub port: u16,

    /// Maximum iterations of one coder tool session
    pub max_iterations: usize,

    pub review_enabled: bool,
    pub shell_tool_enabled: bool,
    pub command_timeout_secs: u64,
    pub review_preview_chars: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no API key variable is set, and
    /// `ConfigError::InvalidValue` if a numeric or boolean variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| ConfigError::MissingEnvVar(API_KEY_VARS[0].to_string()))?;

        let llm_base_url =
            std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "openai/gpt-4o-mini".to_string());

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        Ok(Self {
            api_key,
            llm_base_url,
            default_model,
            temperature: parsed_var("LLM_TEMPERATURE", 0.7)?,
            workspace_path,
            host,
            port: parsed_var("PORT", 8000)?,
            max_iterations: parsed_var("MAX_ITERATIONS", 25)?,
            review_enabled: bool_var("REVIEW_ENABLED", false)?,
            shell_tool_enabled: bool_var("SHELL_TOOL_ENABLED", false)?,
            command_timeout_secs: parsed_var("COMMAND_TIMEOUT_SECS", 30)?,
            review_preview_chars: parsed_var("REVIEW_PREVIEW_CHARS", 2000)?,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            api_key,
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            default_model,
            temperature: 0.7,
            workspace_path,
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_iterations: 25,
            review_enabled: false,
            shell_tool_enabled: false,
            command_timeout_secs: 30,
            review_preview_chars: 2000,
        }
    }
}

fn parsed_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => parse_value(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn bool_var(name: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(name)
        .ok()
        .map(|v| parse_bool(&v).map_err(|e| ConfigError::InvalidValue(name.to_string(), e)))
        .transpose()
        .map(|v| v.unwrap_or(default))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}
