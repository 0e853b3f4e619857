//! Generic outbound HTTP requests.

use crate::error::ConnectorError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::instrument;

const SERVICE: &str = "http";

/// HTTP methods a step may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a request that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCallResult {
    /// Whether the status was 2xx.
    pub success: bool,
    /// Response status code.
    pub status: u16,
}

/// Performs arbitrary HTTP requests with an optional JSON body.
#[async_trait]
pub trait HttpCaller: Send + Sync {
    /// Sends the request. A non-2xx answer is a successful call with
    /// `success == false`.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received.
    async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&JsonValue>,
    ) -> Result<HttpCallResult, Report<ConnectorError>>;
}

/// HTTP caller over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpCaller {
    client: reqwest::Client,
}

impl ReqwestHttpCaller {
    /// Creates a caller sharing the given client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpCaller for ReqwestHttpCaller {
    #[instrument(skip(self, body), fields(method = %method))]
    async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&JsonValue>,
    ) -> Result<HttpCallResult, Report<ConnectorError>> {
        let mut request = self.client.request(method.to_reqwest(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConnectorError::from_reqwest(SERVICE, &e))?;

        let status = response.status();
        Ok(HttpCallResult {
            success: status.is_success(),
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_serde_uses_uppercase() {
        let json = serde_json::to_string(&HttpMethod::Patch).expect("serialize");
        assert_eq!(json, "\"PATCH\"");
        let parsed: HttpMethod = serde_json::from_str("\"DELETE\"").expect("deserialize");
        assert_eq!(parsed, HttpMethod::Delete);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let parsed: Result<HttpMethod, _> = serde_json::from_str("\"TRACE\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn default_method_is_post() {
        assert_eq!(HttpMethod::default(), HttpMethod::Post);
    }
}
