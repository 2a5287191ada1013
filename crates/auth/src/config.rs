//! Configuration for the Google sign-in flow.
//!
//! [`AuthConfig`] is an immutable value supplied once at construction time.
//! The provider endpoints are pinned to Google's OAuth 2.0 surface via
//! [`GoogleEndpoints::default`]; tests point them at a local mock server
//! instead.

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Scopes requested when the caller does not override them
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Seconds before expiry at which a proactive refresh becomes due
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

/// Storage key under which the persisted token record lives
pub const DEFAULT_TOKEN_STORAGE_KEY: &str = "beacon_tokens";

/// Google's OAuth 2.0 endpoint set
///
/// All four endpoints are absolute URLs. `Default` pins the real Google
/// surface; overriding them is intended for tests against a mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleEndpoints {
    /// Authorization endpoint (full-page navigation target)
    pub authorization: String,
    /// Token endpoint (code exchange and refresh grants)
    pub token: String,
    /// Userinfo endpoint (bearer-authenticated profile fetch)
    pub userinfo: String,
    /// Revocation endpoint (best-effort logout)
    pub revocation: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            authorization: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token: "https://oauth2.googleapis.com/token".to_string(),
            userinfo: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            revocation: "https://oauth2.googleapis.com/revoke".to_string(),
        }
    }
}

/// Immutable configuration for the OAuth client
///
/// Constructed once and never mutated by the core. Optional knobs use the
/// `with_*` builders; everything defaults to the values Google sign-in
/// expects.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret
    ///
    /// Optional because installed-app PKCE flows may omit it; when present it
    /// is sent on token-endpoint grants.
    pub client_secret: Option<String>,

    /// Redirect URI registered for this client
    pub redirect_uri: String,

    /// Scopes to request (space-joined on the wire)
    pub scopes: Vec<String>,

    /// Email domains allowed to sign in; empty disables the check
    pub allowed_domains: Vec<String>,

    /// Seconds before expiry at which `should_refresh` turns true
    pub refresh_buffer_secs: i64,

    /// Key under which the chosen token store persists the record
    pub storage_key: String,

    /// Provider endpoint set (Google by default)
    pub endpoints: GoogleEndpoints,
}

impl AuthConfig {
    /// Create a configuration with default scopes, buffer, and endpoints
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            allowed_domains: Vec::new(),
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            storage_key: DEFAULT_TOKEN_STORAGE_KEY.to_string(),
            endpoints: GoogleEndpoints::default(),
        }
    }

    /// Load configuration from `BEACON_CLIENT_ID`, `BEACON_CLIENT_SECRET`,
    /// and `BEACON_REDIRECT_URI`
    ///
    /// Returns `None` when the required variables are not set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("BEACON_CLIENT_ID").ok()?;
        let redirect_uri = std::env::var("BEACON_REDIRECT_URI").ok()?;
        let client_secret = std::env::var("BEACON_CLIENT_SECRET").ok();

        Some(Self::new(client_id, client_secret, redirect_uri))
    }

    /// Replace the requested scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Restrict sign-in to the given email domains
    #[must_use]
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    /// Override the proactive-refresh buffer
    #[must_use]
    pub fn with_refresh_buffer(mut self, seconds: i64) -> Self {
        self.refresh_buffer_secs = seconds;
        self
    }

    /// Override the persisted-record storage key
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Override the provider endpoints (mock servers in tests)
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: GoogleEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Check the configuration for values the flow cannot run without
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfig` when the client ID or redirect URI
    /// is empty.
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig("client_id must not be empty".to_string()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(AuthError::InvalidConfig("redirect_uri must not be empty".to_string()));
        }
        Ok(())
    }

    /// Scopes as the space-separated string the wire format wants
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}
