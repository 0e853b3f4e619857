//! SMS and WhatsApp delivery.
//!
//! Both channels go through the same Twilio Messages endpoint; WhatsApp
//! addresses carry a `whatsapp:` prefix on both ends.

use crate::error::ConnectorError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const SERVICE: &str = "messaging";

/// Default base URL of the Twilio REST API.
pub const TWILIO_API_URL: &str = "https://api.twilio.com";

/// Delivery channel for a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageChannel {
    Sms,
    Whatsapp,
}

impl MessageChannel {
    /// Formats a phone number as an address on this channel.
    #[must_use]
    pub fn address(&self, number: &str) -> String {
        match self {
            Self::Sms => number.to_string(),
            Self::Whatsapp if number.starts_with("whatsapp:") => number.to_string(),
            Self::Whatsapp => format!("whatsapp:{number}"),
        }
    }
}

/// Sends a text message to a phone number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `message` to `to` over `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider could not be reached or refused the message.
    async fn send(
        &self,
        channel: MessageChannel,
        to: &str,
        message: &str,
    ) -> Result<(), Report<ConnectorError>>;
}

/// Twilio Messages API sender.
#[derive(Debug, Clone)]
pub struct TwilioMessenger {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    sms_from: String,
    whatsapp_from: String,
}

impl TwilioMessenger {
    /// Creates a sender for the given account and sender numbers.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        sms_from: impl Into<String>,
        whatsapp_from: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: TWILIO_API_URL.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            sms_from: sms_from.into(),
            whatsapp_from: whatsapp_from.into(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn sender_for(&self, channel: MessageChannel) -> String {
        match channel {
            MessageChannel::Sms => self.sms_from.clone(),
            MessageChannel::Whatsapp => channel.address(&self.whatsapp_from),
        }
    }
}

#[async_trait]
impl MessageSender for TwilioMessenger {
    #[instrument(skip(self, message), fields(channel = ?channel))]
    async fn send(
        &self,
        channel: MessageChannel,
        to: &str,
        message: &str,
    ) -> Result<(), Report<ConnectorError>> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        );
        let to = channel.address(to);
        let from = self.sender_for(channel);

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", message)])
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
