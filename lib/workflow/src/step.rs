//! Workflow steps.
//!
//! A step is one typed unit of work. Steps run in array order; the kind tag
//! selects the handler and the configuration struct that goes with it.
//!
//! Serialized form:
//!
//! ```json
//! {"type": "EMAIL", "config": {"subject": "Hi {{name}}", "body": "..."}}
//! {"type": "WAIT", "delay": 5}
//! ```

use crate::error::ValidationError;
use nurture_ai::AiTask;
use nurture_integration::HttpMethod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on `RetryPolicy::max_attempts`.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// The kind tag of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Email,
    Wait,
    Log,
    Condition,
    AiAgent,
    Slack,
    Http,
    Sms,
    Whatsapp,
}

impl StepKind {
    /// Returns the tag as stored.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Wait => "WAIT",
            Self::Log => "LOG",
            Self::Condition => "CONDITION",
            Self::AiAgent => "AI_AGENT",
            Self::Slack => "SLACK",
            Self::Http => "HTTP",
            Self::Sms => "SMS",
            Self::Whatsapp => "WHATSAPP",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Send an email to the contact's `email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Subject template.
    #[serde(default)]
    pub subject: String,
    /// HTML body template.
    #[serde(default)]
    pub body: String,
}

/// Record a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Message template.
    #[serde(default)]
    pub message: String,
}

/// Comparison used by a condition step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Contains,
    Equals,
    StartsWith,
}

impl ConditionOperator {
    /// Applies the operator, case-sensitively.
    #[must_use]
    pub fn evaluate(&self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Contains => actual.contains(expected),
            Self::Equals => actual == expected,
            Self::StartsWith => actual.starts_with(expected),
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::StartsWith => "starts_with",
        })
    }
}

/// Continue only if a context variable satisfies a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Context key to read.
    pub variable: String,
    /// Comparison.
    pub operator: ConditionOperator,
    /// Literal to compare against.
    #[serde(default)]
    pub value: String,
    /// Editor label of the true branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_label: Option<String>,
    /// Editor label of the false branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_label: Option<String>,
}

/// Ask the AI responder for sentiment or text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAgentConfig {
    /// What to ask for.
    pub task: AiTask,
    /// Prompt template.
    #[serde(default)]
    pub prompt: String,
}

/// Post to a chat incoming webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Webhook URL template.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Message template.
    #[serde(default)]
    pub message: String,
}

/// Call an arbitrary HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// URL template.
    #[serde(default)]
    pub url: Option<String>,
    /// Request method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Body template. JSON text is sent as JSON; absent sends the context.
    #[serde(default)]
    pub body: Option<String>,
}

/// Send a text message (SMS or WhatsApp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Phone number template.
    #[serde(default)]
    pub to: Option<String>,
    /// Message template.
    #[serde(default)]
    pub message: String,
}

/// Kind-specific configuration; the variant is the step's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    Email(EmailConfig),
    /// Pause for the step's `delay`.
    Wait,
    Log(LogConfig),
    Condition(ConditionConfig),
    AiAgent(AiAgentConfig),
    Slack(SlackConfig),
    Http(HttpConfig),
    Sms(MessageConfig),
    Whatsapp(MessageConfig),
}

impl StepAction {
    /// Returns the kind tag of this action.
    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Email(_) => StepKind::Email,
            Self::Wait => StepKind::Wait,
            Self::Log(_) => StepKind::Log,
            Self::Condition(_) => StepKind::Condition,
            Self::AiAgent(_) => StepKind::AiAgent,
            Self::Slack(_) => StepKind::Slack,
            Self::Http(_) => StepKind::Http,
            Self::Sms(_) => StepKind::Sms,
            Self::Whatsapp(_) => StepKind::Whatsapp,
        }
    }
}

/// Opt-in retry of `FAILED` outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// A single attempt.
    #[must_use]
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Whether the attempt count is within bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (1..=MAX_RETRY_ATTEMPTS).contains(&self.max_attempts)
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// What the step does.
    #[serde(flatten)]
    pub action: StepAction,
    /// Delay in seconds; the duration of a WAIT step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Retry policy, if the step opts in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Per-step timeout override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Step {
    /// Creates a step with default policies.
    #[must_use]
    pub fn new(action: StepAction) -> Self {
        Self {
            action,
            delay: None,
            retry: None,
            timeout_secs: None,
        }
    }

    /// EMAIL step.
    #[must_use]
    pub fn email(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(StepAction::Email(EmailConfig {
            subject: subject.into(),
            body: body.into(),
        }))
    }

    /// WAIT step of `seconds`.
    #[must_use]
    pub fn wait(seconds: u64) -> Self {
        Self::new(StepAction::Wait).with_delay(seconds)
    }

    /// LOG step.
    #[must_use]
    pub fn log(message: impl Into<String>) -> Self {
        Self::new(StepAction::Log(LogConfig {
            message: message.into(),
        }))
    }

    /// CONDITION step.
    #[must_use]
    pub fn condition(
        variable: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<String>,
    ) -> Self {
        Self::new(StepAction::Condition(ConditionConfig {
            variable: variable.into(),
            operator,
            value: value.into(),
            true_label: None,
            false_label: None,
        }))
    }

    /// AI_AGENT step.
    #[must_use]
    pub fn ai_agent(task: AiTask, prompt: impl Into<String>) -> Self {
        Self::new(StepAction::AiAgent(AiAgentConfig {
            task,
            prompt: prompt.into(),
        }))
    }

    /// SLACK step.
    #[must_use]
    pub fn slack(webhook_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StepAction::Slack(SlackConfig {
            webhook_url: Some(webhook_url.into()),
            message: message.into(),
        }))
    }

    /// HTTP step.
    #[must_use]
    pub fn http(url: impl Into<String>, method: HttpMethod, body: Option<String>) -> Self {
        Self::new(StepAction::Http(HttpConfig {
            url: Some(url.into()),
            method,
            body,
        }))
    }

    /// SMS step.
    #[must_use]
    pub fn sms(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StepAction::Sms(MessageConfig {
            to: Some(to.into()),
            message: message.into(),
        }))
    }

    /// WHATSAPP step.
    #[must_use]
    pub fn whatsapp(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StepAction::Whatsapp(MessageConfig {
            to: Some(to.into()),
            message: message.into(),
        }))
    }

    /// Sets the delay in seconds.
    #[must_use]
    pub fn with_delay(mut self, seconds: u64) -> Self {
        self.delay = Some(seconds);
        self
    }

    /// Sets a retry policy.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, backoff_ms: u64) -> Self {
        self.retry = Some(RetryPolicy {
            max_attempts,
            backoff_ms,
        });
        self
    }

    /// Sets a timeout override.
    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = Some(seconds);
        self
    }

    /// Returns the kind tag.
    #[must_use]
    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }

    /// Checks the step in position `index`.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        match &self.action {
            StepAction::Condition(config) if config.variable.trim().is_empty() => {
                return Err(ValidationError::EmptyConditionVariable { index });
            }
            StepAction::Email(config)
                if config.subject.trim().is_empty() && config.body.trim().is_empty() =>
            {
                return Err(ValidationError::EmptyEmail { index });
            }
            _ => {}
        }

        if let Some(retry) = self.retry.filter(|r| !r.is_valid()) {
            return Err(ValidationError::InvalidRetry {
                index,
                max_attempts: retry.max_attempts,
            });
        }
        if self.timeout_secs == Some(0) {
            return Err(ValidationError::ZeroTimeout { index });
        }
        Ok(())
    }
}
