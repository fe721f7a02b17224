//! HTTP transport abstraction for the Helix and OAuth endpoints
//!
//! Every request the agent makes goes through [`HelixTransport`]. The seam exists so that
//! the Helix client, the OAuth session and the poller can be driven by scripted responses in
//! tests without touching the network.
//!
//! The transport is a plain request/response primitive: no retries, no backoff, no timeouts.
//! Authentication headers are attached by the caller (`TwitchHelixClient`), not here.
//!
//! # Example Usage:
//! ``
//! use crate::http::{HelixTransport, ReqwestTransport};
//!
//! // In production code
//! let client = TwitchHelixClient::new("client-id", Arc::new(ReqwestTransport::new()));
//!
//! // In tests, replay canned responses instead
//! let client = TwitchHelixClient::new("client-id", Arc::new(ScriptedTransport::new()));
//! ``

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::trace;

use crate::Error;

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct HelixRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HelixRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HelixResponse {
    pub status: u16,
    pub body: String,
}

impl HelixResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. An empty body decodes to `null`.
    pub fn json(&self) -> Result<Value, Error> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// A generic trait for sending one HTTP request and reading the whole response.
#[async_trait]
pub trait HelixTransport: Send + Sync {
    async fn send(&self, request: HelixRequest) -> Result<HelixResponse, Error>;
}

#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HelixTransport for ReqwestTransport {
    async fn send(&self, request: HelixRequest) -> Result<HelixResponse, Error> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(RequestBody::Json(body)) => builder.json(body),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        trace!("{} {} => HTTP {} ({} bytes)", request.method, request.url, status, body.len());

        Ok(HelixResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HelixRequest::new(Method::GET, "https://example.invalid")
            .header("Client-Id", "abc")
            .header("Authorization", "Bearer T");
        assert_eq!(req.header_value("client-id"), Some("abc"));
        assert_eq!(req.header_value("AUTHORIZATION"), Some("Bearer T"));
        assert_eq!(req.header_value("Content-Type"), None);
    }

    #[test]
    fn empty_body_decodes_to_null() {
        let rsp = HelixResponse::new(204, "");
        assert!(rsp.is_success());
        assert_eq!(rsp.json().unwrap(), Value::Null);

        let rsp = HelixResponse::new(500, "not json");
        assert!(!rsp.is_success());
        assert!(matches!(rsp.json(), Err(Error::Json(_))));
    }
}
