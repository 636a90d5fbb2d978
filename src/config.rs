//! User configuration for the curator.
//!
//! The config file is TOML (feeds, destination, email, limits); credentials
//! are resolved from environment variables named in the file, never stored
//! in it.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// System prompt handed to the orchestrator's LLM on every turn.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful reading assistant. \
Your primary task is to read through RSS feeds, pick out articles the user \
cares about, and summarize them. Use the provided tools to fetch feeds, \
triage articles, summarize the accepted ones, and update the remote reading \
list or send the digest by email when asked. Articles from earlier in the \
conversation are numbered; refer to them by number when the user points back \
at one. Unless the user specifies otherwise, produce output as a markdown \
formatted list.";

/// Top-level curator configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct CuratorConfig {
    pub user: UserConfig,
    pub llm: LlmSettings,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub email: Option<EmailSettings>,
    #[serde(default)]
    pub limits: Limits,
}

/// The user's standing feeds and preference profile.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    /// Feeds consulted when a turn names no feed URL.
    #[serde(default)]
    pub top_feeds: Vec<String>,
    /// Standing interests the classifier judges articles against.
    pub interests: String,
    /// Version tag of the preference profile.
    #[serde(default = "default_profile_version")]
    pub profile_version: String,
}

/// LLM endpoint settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
}

impl LlmSettings {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        std::env::var(&self.api_key_env)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar(self.api_key_env.clone()))
    }
}

/// The remote reading-list document.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    /// Repository in `owner/name` form.
    pub repo: String,
    /// Path of the managed file inside the repository.
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Environment variable holding the access token.
    #[serde(default = "default_destination_token_env")]
    pub token_env: String,
    pub committer_name: String,
    pub committer_email: String,
    /// Public page the published list is viewable at, if any.
    #[serde(default)]
    pub page_url: Option<String>,
}

impl DestinationConfig {
    pub fn token(&self) -> Result<SecretString, ConfigError> {
        std::env::var(&self.token_env)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar(self.token_env.clone()))
    }
}

/// Outbound SMTP settings for the email digest.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    /// Environment variable holding the SMTP password.
    #[serde(default = "default_email_password_env")]
    pub password_env: String,
    pub from_address: String,
    pub recipient: String,
}

impl EmailSettings {
    pub fn password(&self) -> Result<SecretString, ConfigError> {
        std::env::var(&self.password_env)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar(self.password_env.clone()))
    }
}

/// Operational bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    /// Maximum articles considered per triage batch.
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    /// Triage only considers articles updated within this many days.
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
    /// Timeout applied to every external call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum capability invocations chained within one turn.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
}

impl Limits {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_articles: default_max_articles(),
            recent_days: default_recent_days(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

impl CuratorConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (owner, name) = self
            .destination
            .repo
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "destination.repo".into(),
                message: "expected owner/name".into(),
            })?;
        if owner.is_empty() || name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "destination.repo".into(),
                message: "expected owner/name".into(),
            });
        }
        if self.destination.path.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "destination.path".into(),
                hint: "set the file path of the managed reading list".into(),
            });
        }
        Ok(())
    }
}

fn default_profile_version() -> String {
    "v1".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_max_tokens() -> u32 {
    1024
}

fn default_llm_temperature() -> f32 {
    0.2
}

fn default_destination_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_password_env() -> String {
    "EMAIL_PASSWORD".to_string()
}

fn default_max_articles() -> usize {
    25
}

fn default_recent_days() -> i64 {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_tool_iterations() -> usize {
    8
}
