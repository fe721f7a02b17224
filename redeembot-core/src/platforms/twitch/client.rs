// File: redeembot-core/src/platforms/twitch/client.rs

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Method;
use serde_json::Value;
use tracing::{trace, warn};

use crate::http::{HelixRequest, HelixResponse, HelixTransport, ReqwestTransport};
use crate::query::QueryString;
use crate::{Credentials, Error};

pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";
pub const OAUTH_BASE_URL: &str = "https://id.twitch.tv/oauth2";

/// Entry point for every Helix and OAuth call the agent makes.
///
/// Constructed once with the application's client id. The credential pair starts out empty
/// (or pre-provisioned) and is replaced wholesale through [`set_credentials`](Self::set_credentials)
/// once the OAuth handshake completes. Headers are built from a snapshot taken at the start
/// of each request, so a replacement is only observed by subsequent calls.
pub struct TwitchHelixClient {
    transport: Arc<dyn HelixTransport>,
    client_id: String,
    credentials: RwLock<Option<Credentials>>,
}

impl TwitchHelixClient {
    pub fn new(client_id: &str, transport: Arc<dyn HelixTransport>) -> Self {
        Self {
            transport,
            client_id: client_id.to_string(),
            credentials: RwLock::new(None),
        }
    }

    /// Client backed by a real `reqwest::Client`.
    pub fn with_reqwest(client_id: &str) -> Self {
        Self::new(client_id, Arc::new(ReqwestTransport::new()))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Replace the current credential pair.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write() = Some(credentials);
    }

    /// Snapshot of the current credential pair, if any.
    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.read().clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.read().is_some()
    }

    pub fn transport(&self) -> Arc<dyn HelixTransport> {
        self.transport.clone()
    }

    /// `Client-Id` and `Authorization: Bearer ...` built from the current credentials.
    pub(crate) fn auth_headers(&self) -> Result<Vec<(String, String)>, Error> {
        let guard = self.credentials.read();
        let creds = guard
            .as_ref()
            .ok_or_else(|| Error::Auth("no credentials set; complete the OAuth handshake first".into()))?;
        Ok(vec![
            ("Client-Id".to_string(), self.client_id.clone()),
            ("Authorization".to_string(), creds.bearer_header()),
        ])
    }

    pub(crate) fn helix_url(endpoint: &str, query: &QueryString) -> String {
        query.append_to(&format!("{}{}", HELIX_BASE_URL, endpoint))
    }

    /// Sends an authenticated Helix request and returns the raw response.
    pub(crate) async fn send_helix(
        &self,
        method: Method,
        endpoint: &str,
        query: &QueryString,
        body: Option<Value>,
    ) -> Result<HelixResponse, Error> {
        let url = Self::helix_url(endpoint, query);
        let mut request = HelixRequest::new(method, url).headers(self.auth_headers()?);
        if let Some(body) = body {
            request = request.json(body);
        }

        trace!("helix => {} {}", request.method, request.url);
        self.transport.send(request).await
    }

    /// GET a Helix endpoint and decode the body as JSON.
    ///
    /// The status code is not interpreted here: Helix error bodies are JSON too, and it is up
    /// to the caller's shape validation to decide what a non-2xx payload means.
    pub async fn get_json(&self, endpoint: &str, query: &QueryString) -> Result<Value, Error> {
        let resp = self.send_helix(Method::GET, endpoint, query, None).await?;
        if !resp.is_success() {
            warn!("GET {} => HTTP {} body={}", endpoint, resp.status, resp.body);
        }
        resp.json()
    }
}
