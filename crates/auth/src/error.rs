//! Error types for the authentication flow.
//!
//! Every fallible protocol operation returns [`AuthError`]. Variants are finer
//! grained than the wire-level failure classes, so [`AuthError::kind`] maps
//! each variant onto a stable machine-readable kind that calling code can
//! branch on, and [`AuthError::record`] flattens the error into a plain
//! serializable shape for logging.
//!
//! Validation helpers in [`crate::jwt`] deliberately do NOT return these
//! errors: they report fail-safe sentinel values ("can't tell" means "not
//! usable") so that expiry checks never take down a caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for authentication operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Error type for all authentication and token lifecycle operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// Configuration is missing or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The authorization flow was rejected or produced an unusable callback
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The signed-in account's email domain is not on the allow-list
    #[error("Authentication failed: domain {domain} is not allowed (permitted: {permitted})", permitted = join_list(.allowed))]
    DomainNotAllowed {
        /// Domain extracted from the profile email
        domain: String,
        /// Domains the configuration permits
        allowed: Vec<String>,
    },

    /// The access token is past its expiry
    #[error("Token expired")]
    TokenExpired,

    /// Refresh-token grant failed or no refresh token was available
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A token could not be decoded as a JWT
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Transport-level failure talking to the authorization server
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// PKCE material could not be generated or was lost mid-flow
    #[error("PKCE error: {0}")]
    Pkce(String),

    /// The userinfo endpoint rejected the profile fetch
    #[error("User info fetch failed: {0}")]
    UserFetch(String),

    /// The underlying storage medium failed or is unavailable
    #[error("Storage error: {0}")]
    Storage(String),

    /// CSRF state nonce missing or mismatched on the callback
    #[error("State validation failed: {0}")]
    InvalidState(String),

    /// The callback URL itself could not be processed
    #[error("Callback error: {0}")]
    Callback(String),

    /// Fallback wrapper for foreign failures
    #[error("Unknown error: {0}")]
    Unknown(String),
}

fn join_list(items: &[String]) -> String {
    items.join(", ")
}

/// Machine-readable failure class carried by every [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Configuration missing or inconsistent
    InvalidConfig,
    /// Authorization rejected, code missing, or account not allowed
    AuthFailed,
    /// Access token past expiry
    TokenExpired,
    /// Refresh grant failed
    TokenRefreshFailed,
    /// Undecodable JWT
    InvalidToken,
    /// Transport failure
    NetworkError,
    /// PKCE generation or verifier loss
    PkceError,
    /// Profile fetch rejected
    UserFetchError,
    /// Storage medium failed or unavailable
    StorageError,
    /// CSRF nonce missing or mismatched
    InvalidState,
    /// Callback URL unprocessable
    CallbackError,
    /// Anything else
    UnknownError,
}

impl ErrorKind {
    /// Stable kebab-case identifier for this kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfig => "invalid-config",
            Self::AuthFailed => "auth-failed",
            Self::TokenExpired => "token-expired",
            Self::TokenRefreshFailed => "token-refresh-failed",
            Self::InvalidToken => "invalid-token",
            Self::NetworkError => "network-error",
            Self::PkceError => "pkce-error",
            Self::UserFetchError => "user-fetch-error",
            Self::StorageError => "storage-error",
            Self::InvalidState => "invalid-state",
            Self::CallbackError => "callback-error",
            Self::UnknownError => "unknown-error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain serializable view of an [`AuthError`] for logs and diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Machine-readable failure class
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Structured details, when the variant carries any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Summary of the wrapped original failure, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl AuthError {
    /// Machine-readable failure class of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::AuthFailed(_) | Self::DomainNotAllowed { .. } => ErrorKind::AuthFailed,
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::RefreshFailed(_) => ErrorKind::TokenRefreshFailed,
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Pkce(_) => ErrorKind::PkceError,
            Self::UserFetch(_) => ErrorKind::UserFetchError,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Callback(_) => ErrorKind::CallbackError,
            Self::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// Flatten into a plain serializable record (kind, message, details,
    /// cause) suitable for logging
    #[must_use]
    pub fn record(&self) -> ErrorRecord {
        let details = match self {
            Self::DomainNotAllowed { domain, allowed } => Some(serde_json::json!({
                "domain": domain,
                "allowed": allowed,
            })),
            _ => None,
        };

        let cause = std::error::Error::source(self).map(ToString::to_string);

        ErrorRecord { kind: self.kind(), message: self.to_string(), details, cause }
    }
}
