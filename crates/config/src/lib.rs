//! Configuration loading, validation, and management for webhound.
//!
//! Loads configuration from `~/.webhound/config.toml` with environment
//! variable overrides for secrets. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.webhound/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider API key (env override: WEBHOUND_API_KEY / OPENAI_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat-completions endpoint
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Bright Data request API settings (search / scrape / download backends)
    #[serde(default)]
    pub bright_data: BrightDataConfig,

    /// Download directory settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Activity log (JSONL) settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Prebuilt prompt catalog served to the client
    #[serde(default)]
    pub prebuilt_prompts: Vec<PrebuiltPrompt>,
}

fn default_provider_url() -> String {
    "https://api.openai.com/v1".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider_url", &self.provider_url)
            .field("agent", &self.agent)
            .field("bright_data", &self.bright_data)
            .field("download", &self.download)
            .field("gateway", &self.gateway)
            .field("telemetry", &self.telemetry)
            .field("prebuilt_prompts", &self.prebuilt_prompts)
            .finish()
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model name sent to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Hard cap on tool invocations per run
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response (None = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "gpt-4.1".into()
}
fn default_max_tool_calls() -> u32 {
    50
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tool_calls: default_max_tool_calls(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Bright Data request API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct BrightDataConfig {
    /// API token (env override: BRIGHT_DATA_API_TOKEN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Zone used for SERP searches
    #[serde(default = "default_serp_zone")]
    pub serp_zone: String,

    /// Zone used for page scrapes and file downloads
    #[serde(default = "default_unlocker_zone")]
    pub web_unlocker_zone: String,
}

fn default_api_base() -> String {
    "https://api.brightdata.com/request".into()
}
fn default_serp_zone() -> String {
    "serp_api1".into()
}
fn default_unlocker_zone() -> String {
    "web_unlocker1".into()
}

impl Default for BrightDataConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base: default_api_base(),
            serp_zone: default_serp_zone(),
            web_unlocker_zone: default_unlocker_zone(),
        }
    }
}

impl std::fmt::Debug for BrightDataConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrightDataConfig")
            .field("api_token", &redact(&self.api_token))
            .field("api_base", &self.api_base)
            .field("serp_zone", &self.serp_zone)
            .field("web_unlocker_zone", &self.web_unlocker_zone)
            .finish()
    }
}

/// Download directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_dir")]
    pub base_dir: String,
}

fn default_download_dir() -> String {
    "downloads".into()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_dir: default_download_dir(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8311
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Activity-log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for the JSONL activity log
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    "logs".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: default_log_dir(),
        }
    }
}

/// A prebuilt prompt shown in the client's sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrebuiltPrompt {
    pub id: String,
    pub label: String,
    pub message: String,

    /// true = pre-fill the input box, false = send directly
    #[serde(default)]
    pub prefill: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.webhound/config.toml).
    ///
    /// Environment variables override file values:
    /// - `WEBHOUND_API_KEY` / `OPENAI_API_KEY` — provider key
    /// - `WEBHOUND_MODEL` — model name
    /// - `BRIGHT_DATA_API_TOKEN` — fetch backend token
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("WEBHOUND_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("WEBHOUND_MODEL") {
            config.agent.model = model;
        }

        if config.bright_data.api_token.is_none() {
            config.bright_data.api_token = std::env::var("BRIGHT_DATA_API_TOKEN").ok();
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".webhound")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_tool_calls == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_calls must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if a provider API key is available.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider_url: default_provider_url(),
            agent: AgentConfig::default(),
            bright_data: BrightDataConfig::default(),
            download: DownloadConfig::default(),
            gateway: GatewayConfig::default(),
            telemetry: TelemetryConfig::default(),
            prebuilt_prompts: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
