//! Production collaborators for the step handlers.

use crate::config::ServerConfig;
use nurture_ai::{ChatCompletionsBackend, LlmBackendConfig};
use nurture_integration::{ReqwestHttpCaller, ResendMailer, TwilioMessenger, WebhookPoster};
use nurture_workflow::Services;
use std::sync::Arc;

/// Builds the HTTP-backed services, sharing one client.
#[must_use]
pub fn build_services(config: &ServerConfig, client: reqwest::Client) -> Services {
    let mail = ResendMailer::new(client.clone(), &config.mail.api_key, &config.mail.from)
        .with_base_url(&config.mail.base_url);

    let mut messaging = TwilioMessenger::new(
        client.clone(),
        &config.messaging.account_sid,
        &config.messaging.auth_token,
        &config.messaging.sms_from,
        &config.messaging.whatsapp_from,
    );
    if let Some(base_url) = &config.messaging.base_url {
        messaging = messaging.with_base_url(base_url);
    }

    let ai = ChatCompletionsBackend::new(client.clone(), LlmBackendConfig::from(&config.ai));

    Services {
        mail: Arc::new(mail),
        chat: Arc::new(WebhookPoster::new(client.clone())),
        http: Arc::new(ReqwestHttpCaller::new(client)),
        messaging: Arc::new(messaging),
        ai: Arc::new(ai),
    }
}
