use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use twitch_oauth2::Scope;
use uuid::Uuid;

use crate::auth::CallbackResult;
use crate::platforms::twitch::client::{OAUTH_BASE_URL, TwitchHelixClient};
use crate::{Credentials, Error};

pub const DEFAULT_CALLBACK_PORT: u16 = 3000;

/// Everything needed to run the authorization-code handshake once.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must match a redirect URI registered for the application, byte for byte.
    pub redirect_uri: String,
    pub scopes: Vec<Scope>,
    /// Ask Twitch to show the consent screen even if the user already authorized the app.
    pub force_verify: bool,
    /// `None` waits for the browser callback indefinitely.
    pub timeout: Option<Duration>,
}

impl AuthConfig {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri_for_port(DEFAULT_CALLBACK_PORT),
            scopes: vec![Scope::ChannelReadRedemptions, Scope::ChannelManageRedemptions],
            force_verify: false,
            timeout: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.redirect_uri = redirect_uri_for_port(port);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn redirect_uri_for_port(port: u16) -> String {
    format!("http://localhost:{}", port)
}

/// One-shot OAuth authorization-code handshake for the broadcaster account.
///
/// [`start`](AuthSession::start) opens the authorization URL, waits for the callback listener
/// to deliver a code, exchanges it for a token pair and installs the pair on the client.
/// There is no retry: a failed exchange is returned to the caller.
pub struct AuthSession {
    config: AuthConfig,
    csrf_state: String,
}

impl AuthSession {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            csrf_state: format!("rb-{}", Uuid::new_v4()),
        }
    }

    /// The `state` value sent with the authorization URL.
    pub fn csrf_state(&self) -> &str {
        &self.csrf_state
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn authorize_url(&self) -> String {
        let scope_str = self
            .config
            .scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut url = format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            OAUTH_BASE_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope_str),
            urlencoding::encode(&self.csrf_state),
        );
        if self.config.force_verify {
            url.push_str("&force_verify=true");
        }
        url
    }

    /// Run the handshake.
    ///
    /// `code_rx` is the callback listener's single-resolution signal; `open_url` is handed the
    /// authorization URL (normally to open it in a browser). Without a configured timeout this
    /// waits until the user completes the browser flow, however long that takes.
    pub async fn start<F>(
        self,
        api: &TwitchHelixClient,
        code_rx: oneshot::Receiver<CallbackResult>,
        open_url: F,
    ) -> Result<Credentials, Error>
    where
        F: FnOnce(&str),
    {
        let url = self.authorize_url();
        debug!("Authorization URL: {}", url);
        open_url(&url);

        let callback = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, code_rx).await?,
            None => code_rx.await,
        }
        .map_err(|_| Error::Auth("callback listener closed before a code was received".into()))?;

        match callback.state.as_deref() {
            Some(state) if state != self.csrf_state => {
                return Err(Error::Auth("OAuth state mismatch; refusing the authorization code".into()));
            }
            None => warn!("OAuth callback carried no state parameter"),
            Some(_) => {}
        }

        let credentials = api
            .exchange_code(&self.config.client_secret, &callback.code, &self.config.redirect_uri)
            .await?;
        api.set_credentials(credentials.clone());
        info!("OAuth handshake complete; credentials installed.");
        Ok(credentials)
    }
}
