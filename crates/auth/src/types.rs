//! Token types and wire structures.
//!
//! [`TokenSet`] is the durable record a token store holds; [`TokenResponse`]
//! is the raw token-endpoint response shape (RFC 6749). A token set is always
//! replaced wholesale — refresh swaps the whole record, logout clears it —
//! and `issued_at` is stamped by the store at write time, never by the
//! server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth 2.0 access and refresh tokens with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token for API authentication
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    /// Optional because the provider does not reissue it on every grant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (JWT) containing user claims (OpenID Connect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Token type (always "Bearer" for OAuth 2.0)
    pub token_type: String,

    /// Access token lifetime in seconds, as reported by the server
    pub expires_in: i64,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Wall-clock time the store accepted this record
    ///
    /// Stamped by `TokenStore::set_tokens`, overwriting any caller value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a new `TokenSet` with `Bearer` type and no issue timestamp
    ///
    /// # Arguments
    /// * `access_token` - The access token
    /// * `refresh_token` - Optional refresh token
    /// * `id_token` - Optional ID token (OpenID Connect)
    /// * `expires_in` - Token lifetime in seconds
    /// * `scope` - Optional space-separated scopes
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: i64,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            id_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            issued_at: None,
        }
    }
}

/// Token response from the authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749). Deserializes
/// responses from the token endpoint for both the authorization-code and
/// refresh-token grants.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Fresh access token
    pub access_token: String,
    /// Refresh token, when the server chose to reissue one
    pub refresh_token: Option<String>,
    /// ID token, when `openid` scope was granted
    pub id_token: Option<String>,
    /// Token type; absent defaults to `Bearer`
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Granted scopes
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a [`TokenSet`], falling back to `previous_refresh_token`
    /// when the server omitted one
    ///
    /// The provider does not reissue the refresh token on every refresh
    /// grant, so the caller threads the token it already holds through here
    /// to keep the session refreshable.
    #[must_use]
    pub fn into_token_set(self, previous_refresh_token: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh_token.map(ToString::to_string)),
            id_token: self.id_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: self.expires_in,
            scope: self.scope,
            issued_at: None,
        }
    }
}
