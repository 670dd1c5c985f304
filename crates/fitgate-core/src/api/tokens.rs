use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Long-lived OAuth1 token obtained from the SSO ticket.
/// It is only used to mint OAuth2 access tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default)]
    pub mfa_token: Option<String>,
    #[serde(default)]
    pub mfa_expiration_timestamp: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl fmt::Debug for OAuth1Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1Token")
            .field("oauth_token", &"<redacted>")
            .field("has_mfa_token", &self.mfa_token.is_some())
            .field("domain", &self.domain)
            .finish()
    }
}

/// Short-lived bearer token used for data calls.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix seconds
    pub expires_at: i64,
    pub refresh_token_expires_in: i64,
    /// Unix seconds
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().timestamp()
    }

    /// Value for the `Authorization` header, e.g. `Bearer abc`.
    pub fn authorization(&self) -> String {
        let mut kind = self.token_type.to_lowercase();
        if let Some(first) = kind.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        format!("{} {}", kind, self.access_token)
    }
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body of the OAuth1 → OAuth2 exchange endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeResponse {
    #[serde(default)]
    scope: String,
    #[serde(default)]
    jti: String,
    token_type: String,
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    refresh_token_expires_in: i64,
}

impl ExchangeResponse {
    /// Stamp absolute expiry times relative to `now` (unix seconds).
    pub(crate) fn into_token(self, now: i64) -> OAuth2Token {
        OAuth2Token {
            scope: self.scope,
            jti: self.jti,
            token_type: self.token_type,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            expires_at: now + self.expires_in,
            refresh_token_expires_in: self.refresh_token_expires_in,
            refresh_token_expires_at: now + self.refresh_token_expires_in,
        }
    }
}
