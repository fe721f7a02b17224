// OAuth token endpoints: authorization-code exchange and /validate.
//
// Both go through the same transport as the Helix calls but against id.twitch.tv,
// and neither uses the Helix `Client-Id` + `Bearer` header pair.

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use crate::http::HelixRequest;
use crate::platforms::twitch::client::{OAUTH_BASE_URL, TwitchHelixClient};
use crate::{Credentials, Error};

#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<Vec<String>>,
}

/// Response of `GET /oauth2/validate`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenValidation {
    pub client_id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TwitchHelixClient {
    /// Exchange an authorization code for a credential pair.
    ///
    /// Does not store the result; the caller decides when to swap it in.
    pub async fn exchange_code(
        &self,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credentials, Error> {
        let params = vec![
            ("client_id".to_string(), self.client_id().to_string()),
            ("client_secret".to_string(), client_secret.to_string()),
            ("code".to_string(), code.to_string()),
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
        ];
        let request = HelixRequest::new(Method::POST, format!("{}/token", OAUTH_BASE_URL)).form(params);

        let resp = self.transport().send(request).await?;
        if !resp.is_success() {
            return Err(Error::Auth(format!(
                "Twitch token endpoint error: HTTP {} => {}",
                resp.status, resp.body
            )));
        }

        let token: TwitchTokenResponse = serde_json::from_str(&resp.body)
            .map_err(|e| Error::Auth(format!("Parse error on token JSON: {e}")))?;

        debug!(
            "exchange_code => access_token len={} refresh_token len={} expires_in={:?}",
            token.access_token.len(),
            token.refresh_token.len(),
            token.expires_in
        );

        Ok(Credentials::new(token.access_token, token.refresh_token)
            .with_expires_in(token.expires_in)
            .with_scopes(token.scope.unwrap_or_default()))
    }

    /// Validate the current access token and learn who it belongs to.
    pub async fn validate_token(&self) -> Result<TokenValidation, Error> {
        let creds = self
            .credentials()
            .ok_or_else(|| Error::Auth("no credentials to validate".into()))?;
        let request = HelixRequest::new(Method::GET, format!("{}/validate", OAUTH_BASE_URL))
            .header("Authorization", format!("OAuth {}", creds.access_token));

        let resp = self.transport().send(request).await?;
        if !resp.is_success() {
            return Err(Error::Auth(format!("Failed to validate token: HTTP {}", resp.status)));
        }

        let validation: TokenValidation = serde_json::from_str(&resp.body)
            .map_err(|e| Error::Auth(format!("Error parsing /validate response: {e}")))?;
        debug!(
            "/validate returned login={:?} user_id={:?}",
            validation.login, validation.user_id
        );
        Ok(validation)
    }
}
