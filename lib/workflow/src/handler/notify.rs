//! Outbound notification handlers: chat webhooks, HTTP calls, SMS and
//! WhatsApp.
//!
//! The destination is a template. A destination that is missing, or blank
//! once expanded, fails the step without calling out.

use crate::context::VariableContext;
use crate::execution::StepOutcome;
use crate::step::{HttpConfig, MessageConfig, SlackConfig};
use crate::template::expand;
use nurture_integration::{ChatPoster, HttpCaller, HttpMethod, MessageChannel, MessageSender};
use serde_json::Value as JsonValue;
use tracing::warn;

fn destination(template: Option<&str>, ctx: &VariableContext) -> Option<String> {
    template
        .map(|t| expand(t, ctx))
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

pub(super) async fn slack(
    chat: &dyn ChatPoster,
    config: &SlackConfig,
    ctx: &VariableContext,
) -> StepOutcome {
    let Some(url) = destination(config.webhook_url.as_deref(), ctx) else {
        return StepOutcome::failed("no webhook URL configured");
    };
    let message = expand(&config.message, ctx);
    match chat.post(&url, &message).await {
        Ok(()) => StepOutcome::success("posted to chat webhook"),
        Err(report) => {
            warn!(error = %report, "chat webhook failed");
            StepOutcome::failed(format!("chat webhook failed: {report}"))
        }
    }
}

/// Builds the request body.
///
/// Without a body template the whole context is sent. A template that
/// expands to valid JSON is sent as that JSON, anything else as a JSON
/// string. GET requests carry no body.
fn request_body(config: &HttpConfig, ctx: &VariableContext) -> Option<JsonValue> {
    if config.method == HttpMethod::Get {
        return None;
    }
    let body = match &config.body {
        None => ctx.to_json(),
        Some(template) => {
            let rendered = expand(template, ctx);
            serde_json::from_str(&rendered).unwrap_or(JsonValue::String(rendered))
        }
    };
    Some(body)
}

pub(super) async fn http(
    caller: &dyn HttpCaller,
    config: &HttpConfig,
    ctx: &VariableContext,
) -> StepOutcome {
    let Some(url) = destination(config.url.as_deref(), ctx) else {
        return StepOutcome::failed("no URL configured");
    };
    let body = request_body(config, ctx);
    match caller.request(&url, config.method, body.as_ref()).await {
        Ok(result) if result.success => {
            StepOutcome::success(format!("{} {url} -> {}", config.method, result.status))
        }
        Ok(result) => StepOutcome::failed(format!(
            "{} {url} answered {}",
            config.method, result.status
        )),
        Err(report) => {
            warn!(url = %url, error = %report, "HTTP step failed");
            StepOutcome::failed(format!("HTTP request failed: {report}"))
        }
    }
}

pub(super) async fn message(
    sender: &dyn MessageSender,
    channel: MessageChannel,
    config: &MessageConfig,
    ctx: &VariableContext,
) -> StepOutcome {
    let Some(to) = destination(config.to.as_deref(), ctx) else {
        return StepOutcome::failed("no recipient phone number");
    };
    let text = expand(&config.message, ctx);
    match sender.send(channel, &to, &text).await {
        Ok(()) => StepOutcome::success(format!("sent to {}", channel.address(&to))),
        Err(report) => {
            warn!(channel = ?channel, error = %report, "message delivery failed");
            StepOutcome::failed(format!("message delivery failed: {report}"))
        }
    }
}
