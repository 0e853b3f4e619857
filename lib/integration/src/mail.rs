//! Transactional mail delivery.
//!
//! The engine hands a fully rendered message (recipient, subject, HTML body)
//! to a [`MailSender`]. The production sender speaks the Resend HTTP API.

use crate::error::ConnectorError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const SERVICE: &str = "mail";

/// Default base URL of the Resend API.
pub const RESEND_API_URL: &str = "https://api.resend.com";

/// The outcome of a send attempt that reached the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Whether the provider accepted the message.
    pub success: bool,
    /// Provider message id, when accepted.
    pub id: Option<String>,
    /// Provider error, when refused.
    pub error: Option<String>,
}

impl DeliveryResult {
    /// The provider accepted the message.
    #[must_use]
    pub fn delivered(id: Option<String>) -> Self {
        Self {
            success: true,
            id,
            error: None,
        }
    }

    /// The provider refused the message.
    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            error: Some(error.into()),
        }
    }
}

/// Sends rendered HTML mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider could not be reached at all.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<DeliveryResult, Report<ConnectorError>>;
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

/// Mail sender backed by the Resend API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    /// Creates a mailer sending as `from`.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            base_url: RESEND_API_URL.to_string(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl MailSender for ResendMailer {
    #[instrument(skip(self, html), fields(subject = %subject))]
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<DeliveryResult, Report<ConnectorError>> {
        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&ResendRequest {
                from: &self.from,
                to: [to],
                subject,
                html,
            })
            .send()
            .await
            .map_err(|e| ConnectorError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "mail provider refused message");
            return Ok(DeliveryResult::rejected(format!("{status}: {body}")));
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::from_reqwest(SERVICE, &e))?;
        Ok(DeliveryResult::delivered(parsed.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_result() {
        let result = DeliveryResult::delivered(Some("msg_1".to_string()));
        assert!(result.success);
        assert_eq!(result.id.as_deref(), Some("msg_1"));
        assert!(result.error.is_none());
    }

    #[test]
    fn rejected_result() {
        let result = DeliveryResult::rejected("invalid recipient");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("invalid recipient"));
    }

    #[test]
    fn resend_request_shape() {
        let body = serde_json::to_value(ResendRequest {
            from: "news@example.com",
            to: ["ana@example.com"],
            subject: "Hi",
            html: "<p>Hello</p>",
        })
        .expect("serialize");
        assert_eq!(body["to"][0], "ana@example.com");
        assert_eq!(body["from"], "news@example.com");
    }

    #[tokio::test]
    async fn unreachable_provider_is_an_error() {
        let mailer = ResendMailer::new(reqwest::Client::new(), "key", "news@example.com")
            .with_base_url("http://127.0.0.1:9");
        let result = mailer.send("ana@example.com", "Hi", "<p>x</p>").await;
        assert!(result.is_err());
    }
}
