//! Chat webhook notifications (Slack, Discord, Mattermost and friends).

use crate::error::ConnectorError;
use async_trait::async_trait;
use rootcause::Report;
use serde::Serialize;
use tracing::instrument;

const SERVICE: &str = "chat webhook";

/// Posts a plain-text message to an incoming-webhook URL.
#[async_trait]
pub trait ChatPoster: Send + Sync {
    /// Posts `message` to `webhook_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook could not be reached or refused the post.
    async fn post(&self, webhook_url: &str, message: &str) -> Result<(), Report<ConnectorError>>;
}

/// Payload understood by Slack (`text`) and Discord-style (`content`) hooks.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
    content: &'a str,
}

/// Webhook poster over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct WebhookPoster {
    client: reqwest::Client,
}

impl WebhookPoster {
    /// Creates a poster sharing the given client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatPoster for WebhookPoster {
    #[instrument(skip(self, message))]
    async fn post(&self, webhook_url: &str, message: &str) -> Result<(), Report<ConnectorError>> {
        let response = self
            .client
            .post(webhook_url)
            .json(&WebhookPayload {
                text: message,
                content: message,
            })
            .send()
            .await
            .map_err(|e| ConnectorError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ConnectorError::Rejected {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_both_fields() {
        let json = serde_json::to_value(WebhookPayload {
            text: "new lead",
            content: "new lead",
        })
        .expect("serialize");
        assert_eq!(json["text"], "new lead");
        assert_eq!(json["content"], "new lead");
    }

    #[tokio::test]
    async fn malformed_url_is_an_error() {
        let poster = WebhookPoster::default();
        let err = poster.post("not a url", "hello").await.unwrap_err();
        assert!(err.to_string().contains("chat webhook"));
    }
}
