//! Trigger kinds and payload filters.
//!
//! A workflow names one [`TriggerKind`]. Its optional [`TriggerFilter`] narrows
//! the match to payloads carrying specific values, e.g. a single form id.

use crate::context::VariableContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The event that starts a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A public form was submitted.
    FormSubmitted,
    /// A contact was added to the CRM.
    ContactCreated,
    /// A visitor wrote in the chat widget.
    ChatMessage,
    /// An inbound webhook call.
    Webhook,
    /// Started by hand.
    Manual,
}

impl TriggerKind {
    /// Returns the kind as used in URLs and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormSubmitted => "form_submitted",
            Self::ContactCreated => "contact_created",
            Self::ChatMessage => "chat_message",
            Self::Webhook => "webhook",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown trigger kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTriggerKind(pub String);

impl fmt::Display for UnknownTriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown trigger kind: {}", self.0)
    }
}

impl std::error::Error for UnknownTriggerKind {}

impl FromStr for TriggerKind {
    type Err = UnknownTriggerKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form_submitted" => Ok(Self::FormSubmitted),
            "contact_created" => Ok(Self::ContactCreated),
            "chat_message" => Ok(Self::ChatMessage),
            "webhook" => Ok(Self::Webhook),
            "manual" => Ok(Self::Manual),
            other => Err(UnknownTriggerKind(other.to_string())),
        }
    }
}

/// Required payload values. Every entry must match; empty matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerFilter(BTreeMap<String, String>);

impl TriggerFilter {
    /// A filter that matches every payload.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Adds a required key/value pair.
    #[must_use]
    pub fn require(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Whether the filter has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the payload against every entry, comparing text renderings.
    #[must_use]
    pub fn matches(&self, payload: &VariableContext) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| payload.get_text(key).as_deref() == Some(expected.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_parses_url_segments() {
        assert_eq!(
            "form_submitted".parse::<TriggerKind>(),
            Ok(TriggerKind::FormSubmitted)
        );
        assert_eq!("manual".parse::<TriggerKind>(), Ok(TriggerKind::Manual));
        assert!("FORM_SUBMITTED".parse::<TriggerKind>().is_err());
        assert!("cron".parse::<TriggerKind>().is_err());
    }

    #[test]
    fn kind_serde_matches_display() {
        let json = serde_json::to_string(&TriggerKind::ChatMessage).expect("serialize");
        assert_eq!(json, "\"chat_message\"");
        assert_eq!(TriggerKind::ChatMessage.to_string(), "chat_message");
    }

    #[test]
    fn empty_filter_matches_anything() {
        let payload = VariableContext::new();
        assert!(TriggerFilter::any().matches(&payload));
    }

    #[test]
    fn filter_requires_every_entry() {
        let filter = TriggerFilter::any()
            .require("form_id", "contact-us")
            .require("page", "3");
        let payload = VariableContext::from_payload(json!({
            "form_id": "contact-us",
            "page": 3,
            "email": "a@x.com",
        }))
        .expect("object");
        assert!(filter.matches(&payload));

        let other = VariableContext::from_payload(json!({"form_id": "newsletter", "page": 3}))
            .expect("object");
        assert!(!filter.matches(&other));

        let partial =
            VariableContext::from_payload(json!({"form_id": "contact-us"})).expect("object");
        assert!(!filter.matches(&partial));
    }
}
