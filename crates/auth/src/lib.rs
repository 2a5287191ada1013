//! Client-side Google OAuth 2.0 + PKCE with token lifecycle management.
//!
//! This crate drives the authorization-code flow against a single identity
//! provider (Google) and layers a small state-management core on top of it:
//! token storage, expiry tracking, and proactive refresh scheduling.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AuthSession   │  High-level orchestrator + refresh timer
//! └────────┬────────┘
//!          │
//!          ├──► OAuthClient        (authorization URL, callback validation,
//!          │                        code exchange, refresh, profile, revoke)
//!          ├──► TokenManager       (lifecycle queries over one store)
//!          │         │
//!          │         └──► TokenStore       (memory / session / persistent)
//!          │                   │
//!          │                   └──► KeyValueMedium  (injected capability)
//!          │
//!          ├──► pkce utilities    (verifier/challenge/state generation)
//!          └──► jwt utilities     (payload decode, expiry predicates)
//! ```
//!
//! # Security properties
//!
//! - **PKCE (RFC 7636)**: every login binds its authorization code to a
//!   fresh verifier; the verifier never appears in the authorization URL.
//! - **State validation**: a per-login CSRF nonce is compared by exact
//!   equality on the callback and is single-use.
//! - **Non-authoritative decoding**: JWT payloads are decoded but never
//!   signature-verified; nothing here is a trust boundary. The fail-safe
//!   validator treats anything undecodable as expired.
//! - **Best-effort revocation**: logout always succeeds locally.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use beacon_auth::{
//!     AuthConfig, AuthSession, InMemoryMedium, MemoryTokenStore, OAuthClient, TokenManager,
//! };
//!
//! # async fn example() -> Result<(), beacon_auth::AuthError> {
//! let config = AuthConfig::new(
//!     "client-id.apps.googleusercontent.com",
//!     Some("client-secret".to_string()),
//!     "http://localhost:8080/callback",
//! )
//! .with_allowed_domains(vec!["example.com".to_string()]);
//!
//! let client = OAuthClient::new(config, Arc::new(InMemoryMedium::new()))?;
//! let manager = TokenManager::new(Arc::new(MemoryTokenStore::new()));
//! let session = AuthSession::new(client, manager);
//!
//! // Navigate the user to the authorization URL...
//! let auth_url = session.start_login()?;
//!
//! // ...and complete the login from the provider callback.
//! let tokens = session.complete_login("http://localhost:8080/callback?code=...&state=...").await?;
//! println!("Access token expires in {} seconds", tokens.expires_in);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod config;
pub mod error;
pub mod jwt;
pub mod manager;
pub mod pkce;
pub mod session;
pub mod store;
pub mod types;
pub mod user;

// Re-export commonly used types and functions
pub use client::{OAuthClient, OAUTH_STATE_KEY, PKCE_VERIFIER_KEY};
pub use config::{
    AuthConfig, GoogleEndpoints, DEFAULT_REFRESH_BUFFER_SECS, DEFAULT_SCOPES,
    DEFAULT_TOKEN_STORAGE_KEY,
};
pub use error::{AuthError, AuthResult, ErrorKind, ErrorRecord};
pub use jwt::{
    decode_token, get_time_until_expiration, get_token_expiration, is_token_expired,
    validate_token, Audience, DecodedClaims, ValidationOptions,
};
pub use manager::TokenManager;
pub use pkce::{
    base64_url_encode, generate_code_challenge, generate_code_verifier, generate_random_string,
    generate_state, verify_pkce, PkceChallenge,
};
pub use session::AuthSession;
pub use store::{
    FileMedium, InMemoryMedium, KeyValueMedium, MemoryTokenStore, PersistentTokenStore,
    SessionTokenStore, TokenStore,
};
pub use types::{TokenResponse, TokenSet};
pub use user::{GoogleUserInfo, UserProfile};
