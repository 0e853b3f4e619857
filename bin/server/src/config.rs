//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`ENGINE__LONG_WAIT=suspend`, `MAIL__API_KEY=...`).

use nurture_ai::{LlmBackendConfig, LlmProvider};
use nurture_integration::mail::RESEND_API_URL;
use nurture_workflow::{InterpreterConfig, LongWaitMode};
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the intake server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Database pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Interpreter tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// WAIT steps shorter than this block in place.
    #[serde(default = "default_wait_threshold_secs")]
    pub wait_threshold_secs: u64,

    /// Default per-step timeout.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// `continue` or `suspend`.
    #[serde(default)]
    pub long_wait: LongWaitMode,
}

fn default_wait_threshold_secs() -> u64 {
    10
}

fn default_step_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_threshold_secs: default_wait_threshold_secs(),
            step_timeout_secs: default_step_timeout_secs(),
            long_wait: LongWaitMode::default(),
        }
    }
}

impl From<&EngineConfig> for InterpreterConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            wait_threshold: Duration::from_secs(config.wait_threshold_secs),
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            long_wait: config.long_wait,
        }
    }
}

/// Transactional mail provider.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_mail_from")]
    pub from: String,

    #[serde(default = "default_mail_base_url")]
    pub base_url: String,
}

fn default_mail_from() -> String {
    "noreply@example.com".to_string()
}

fn default_mail_base_url() -> String {
    RESEND_API_URL.to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from: default_mail_from(),
            base_url: default_mail_base_url(),
        }
    }
}

/// SMS and WhatsApp provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    /// Sender number for SMS.
    #[serde(default)]
    pub sms_from: String,

    /// Sender number for WhatsApp, without the `whatsapp:` prefix.
    #[serde(default)]
    pub whatsapp_from: String,

    #[serde(default)]
    pub base_url: Option<String>,
}

/// AI backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    #[serde(default = "default_ai_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            api_key: None,
            temperature: None,
        }
    }
}

impl From<&AiConfig> for LlmBackendConfig {
    fn from(config: &AiConfig) -> Self {
        Self {
            provider: config.provider,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        }
    }
}

/// Resume scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between deferred-queue polls, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    15
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_match_interpreter_defaults() {
        let config = InterpreterConfig::from(&EngineConfig::default());
        assert_eq!(config, InterpreterConfig::default());
    }

    #[test]
    fn long_wait_mode_parses() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"long_wait": "suspend", "step_timeout_secs": 5}"#)
                .expect("deserialize");
        assert_eq!(config.long_wait, LongWaitMode::Suspend);
        assert_eq!(config.step_timeout_secs, 5);
        assert_eq!(config.wait_threshold_secs, 10);
    }

    #[test]
    fn only_database_url_is_required() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"database_url": "postgres://localhost/nurture"}"#)
                .expect("deserialize");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.scheduler.poll_interval_secs, 15);
        assert_eq!(config.mail.base_url, RESEND_API_URL);
        assert_eq!(LlmBackendConfig::from(&config.ai).model, "gpt-4o-mini");
    }
}
