use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An OAuth access/refresh token pair for the broadcaster account.
///
/// A pair is never mutated in place. Re-authorization produces a new value that
/// replaces the old one wholesale (see `TwitchHelixClient::set_credentials`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    /// Scopes granted by the token endpoint, if it reported them.
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            scopes: Vec::new(),
            expires_at: None,
        }
    }

    /// Stamp an expiry relative to now from an `expires_in` seconds value.
    /// A value too large to represent leaves the expiry unknown.
    pub fn with_expires_in(mut self, expires_in: Option<u64>) -> Self {
        self.expires_at = expires_in.and_then(|secs| {
            let delta = Duration::try_seconds(i64::try_from(secs).ok()?)?;
            Utc::now().checked_add_signed(delta)
        });
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_uses_access_token() {
        let creds = Credentials::new("T", "Rr");
        assert_eq!(creds.bearer_header(), "Bearer T");
        assert!(creds.has_refresh_token());
    }

    #[test]
    fn expiry_is_optional() {
        let creds = Credentials::new("T", "").with_expires_in(None);
        assert!(creds.expires_at.is_none());
        assert!(!creds.has_refresh_token());

        let creds = Credentials::new("T", "Rr").with_expires_in(Some(3600));
        let remaining = creds.expires_at.unwrap() - Utc::now();
        assert!(remaining.num_seconds() > 3500);
    }

    #[test]
    fn unrepresentable_expiry_is_left_unknown() {
        let creds = Credentials::new("T", "Rr").with_expires_in(Some(1_000_000_000_000_000));
        assert!(creds.expires_at.is_none());

        let creds = Credentials::new("T", "Rr").with_expires_in(Some(u64::MAX));
        assert!(creds.expires_at.is_none());
    }
}
