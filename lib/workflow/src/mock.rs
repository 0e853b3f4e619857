//! Recording test doubles for every external collaborator.
//!
//! Compiled for this crate's tests and behind the `test-util` feature for
//! embedders that want to exercise workflows without delivering anything.

use crate::handler::Services;
use async_trait::async_trait;
use nurture_ai::{AiError, AiResponder, AiResult, AiTask};
use nurture_integration::{
    ChatPoster, ConnectorError, DeliveryResult, HttpCallResult, HttpCaller, HttpMethod,
    MailSender, MessageChannel, MessageSender,
};
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A message accepted by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Mail sender that records accepted messages.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    attempts: Mutex<u32>,
    refuse_first: u32,
    latency: Option<Duration>,
}

impl RecordingMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses the first `n` messages.
    #[must_use]
    pub fn failing_first(mut self, n: u32) -> Self {
        self.refuse_first = n;
        self
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }

    /// Number of send calls, accepted or not.
    pub async fn attempts(&self) -> u32 {
        *self.attempts.lock().await
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<DeliveryResult, Report<ConnectorError>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let attempt = {
            let mut attempts = self.attempts.lock().await;
            *attempts += 1;
            *attempts
        };
        if attempt <= self.refuse_first {
            return Ok(DeliveryResult::rejected("mailbox unavailable"));
        }

        let mut sent = self.sent.lock().await;
        sent.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(DeliveryResult::delivered(Some(format!("msg_{}", sent.len()))))
    }
}

/// Chat poster that records `(webhook_url, message)` pairs.
#[derive(Debug, Default)]
pub struct RecordingChat {
    posts: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingChat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every post.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().await.clone()
    }
}

#[async_trait]
impl ChatPoster for RecordingChat {
    async fn post(&self, webhook_url: &str, message: &str) -> Result<(), Report<ConnectorError>> {
        if self.fail {
            return Err(ConnectorError::Rejected {
                service: "chat".to_string(),
                status: 500,
                body: "webhook unavailable".to_string(),
            }
            .into());
        }
        self.posts
            .lock()
            .await
            .push((webhook_url.to_string(), message.to_string()));
        Ok(())
    }
}

/// A request seen by [`RecordingHttp`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<JsonValue>,
}

/// HTTP caller that records requests and answers with a fixed status.
#[derive(Debug)]
pub struct RecordingHttp {
    calls: Mutex<Vec<HttpCall>>,
    status: u16,
}

impl Default for RecordingHttp {
    fn default() -> Self {
        Self::responding(200)
    }
}

impl RecordingHttp {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn responding(status: u16) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            status,
        }
    }

    pub async fn calls(&self) -> Vec<HttpCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl HttpCaller for RecordingHttp {
    async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&JsonValue>,
    ) -> Result<HttpCallResult, Report<ConnectorError>> {
        self.calls.lock().await.push(HttpCall {
            url: url.to_string(),
            method,
            body: body.cloned(),
        });
        Ok(HttpCallResult {
            success: (200..300).contains(&self.status),
            status: self.status,
        })
    }
}

/// A text message seen by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: MessageChannel,
    pub to: String,
    pub message: String,
}

/// SMS/WhatsApp sender that records messages.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    fail: bool,
}

impl RecordingMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every send with a connection error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageSender for RecordingMessenger {
    async fn send(
        &self,
        channel: MessageChannel,
        to: &str,
        message: &str,
    ) -> Result<(), Report<ConnectorError>> {
        if self.fail {
            return Err(ConnectorError::ConnectionFailed {
                service: "messaging".to_string(),
                reason: "provider unreachable".to_string(),
            }
            .into());
        }
        self.sent.lock().await.push(SentMessage {
            channel,
            to: to.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// A call seen by [`ScriptedAi`].
#[derive(Debug, Clone, PartialEq)]
pub struct AiCall {
    pub task: AiTask,
    pub prompt: String,
    pub context: JsonValue,
}

/// AI responder returning a fixed answer, normalised per task.
#[derive(Debug, Default)]
pub struct ScriptedAi {
    answer: Option<String>,
    calls: Mutex<Vec<AiCall>>,
}

impl ScriptedAi {
    #[must_use]
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with an empty response.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<AiCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl AiResponder for ScriptedAi {
    async fn generate(
        &self,
        prompt: &str,
        context: &JsonValue,
        task: AiTask,
    ) -> Result<AiResult, Report<AiError>> {
        self.calls.lock().await.push(AiCall {
            task,
            prompt: prompt.to_string(),
            context: context.clone(),
        });
        let answer = self.answer.as_deref().ok_or(AiError::EmptyResponse)?;
        Ok(AiResult {
            result: task.normalise(answer),
        })
    }
}

/// One of each double, shared with the [`Services`] they back.
#[derive(Debug, Clone)]
pub struct MockServices {
    pub mail: Arc<RecordingMailer>,
    pub chat: Arc<RecordingChat>,
    pub http: Arc<RecordingHttp>,
    pub messaging: Arc<RecordingMessenger>,
    pub ai: Arc<ScriptedAi>,
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServices {
    /// Doubles that accept everything; the AI answers `neutral`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mail: Arc::new(RecordingMailer::new()),
            chat: Arc::new(RecordingChat::new()),
            http: Arc::new(RecordingHttp::new()),
            messaging: Arc::new(RecordingMessenger::new()),
            ai: Arc::new(ScriptedAi::answering("neutral")),
        }
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: RecordingMailer) -> Self {
        self.mail = Arc::new(mailer);
        self
    }

    #[must_use]
    pub fn with_ai_answer(mut self, answer: impl Into<String>) -> Self {
        self.ai = Arc::new(ScriptedAi::answering(answer));
        self
    }

    #[must_use]
    pub fn services(&self) -> Services {
        Services {
            mail: self.mail.clone(),
            chat: self.chat.clone(),
            http: self.http.clone(),
            messaging: self.messaging.clone(),
            ai: self.ai.clone(),
        }
    }
}
