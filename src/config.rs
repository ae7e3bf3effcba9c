//! YAML configuration
//!
//! Everything lives under a top-level `config:` key. Missing or malformed
//! configuration is fatal at startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "HITL_AGENT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing required config value: {0}")]
    Missing(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    config: Config,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub openai: OpenAiSettings,
    pub tavily: TavilySettings,
    pub tools: ToolSettings,
    pub langsmith: TelemetrySettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Completion token cap sent with every model request
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TavilySettings {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    pub search_web: bool,
}

/// Tracing export settings, handed to an external exporter
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub langchain_tracing_v2: Option<String>,
    pub langchain_endpoint: Option<String>,
    pub langchain_api_key: Option<String>,
    pub langchain_project: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            max_search_results: default_max_search_results(),
        }
    }
}

fn default_recursion_limit() -> u32 {
    10
}

fn default_max_search_results() -> u32 {
    2
}

/// Config file location: `$HITL_AGENT_CONFIG` or `./config.yaml`
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

impl Config {
    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        file.config.validate()?;
        Ok(file.config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.openai.model.trim().is_empty() {
            return Err(ConfigError::Missing("openai.model"));
        }
        if self.openai.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("openai.api_key"));
        }
        if self.tools.search_web && self.tavily_key().is_none() {
            return Err(ConfigError::Missing("tavily.api_key"));
        }
        if let Some(telemetry) = self.telemetry() {
            let required = [
                (&telemetry.langchain_tracing_v2, "langsmith.langchain_tracing_v2"),
                (&telemetry.langchain_endpoint, "langsmith.langchain_endpoint"),
                (&telemetry.langchain_api_key, "langsmith.langchain_api_key"),
                (&telemetry.langchain_project, "langsmith.langchain_project"),
            ];
            for (value, name) in required {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(ConfigError::Missing(name));
                }
            }
        }
        if self.agent.recursion_limit == 0 {
            return Err(ConfigError::Invalid(
                "agent.recursion_limit must be at least 1".to_string(),
            ));
        }
        if self.openai.max_tokens == Some(0) {
            return Err(ConfigError::Invalid(
                "openai.max_tokens must be at least 1".to_string(),
            ));
        }
        if self.agent.max_search_results == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_search_results must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Search credential, if configured and non-empty
    pub fn tavily_key(&self) -> Option<&str> {
        Some(self.tavily.api_key.trim()).filter(|key| !key.is_empty())
    }

    /// Enabled telemetry settings, if any
    pub fn telemetry(&self) -> Option<&TelemetrySettings> {
        Some(&self.langsmith).filter(|t| t.enabled)
    }
}
