//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636: a per-login verifier/challenge pair binds the
//! authorization code to the client that requested it, preventing code
//! interception attacks. The verifier stays in transient storage until the
//! callback completes; only the challenge travels in the authorization URL.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

/// Raw bytes fed into the code verifier (32 bytes → 43 chars base64url,
/// within the RFC 7636 43-128 limit)
const CODE_VERIFIER_BYTES: usize = 32;

/// Raw bytes fed into the CSRF state nonce
const STATE_BYTES: usize = 32;

/// Encode bytes as URL-safe base64 without padding
///
/// Standard base64 with `+` → `-`, `/` → `_`, and `=` stripped.
/// Deterministic and byte-exact.
#[must_use]
pub fn base64_url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a URL-safe random string from `len_bytes` of CSPRNG output
///
/// The output contains none of `+`, `/`, `=`, making it usable directly in
/// query parameters and as PKCE material.
///
/// # Errors
/// Returns `AuthError::Pkce` if random number generation fails (extremely
/// rare)
pub fn generate_random_string(len_bytes: usize) -> AuthResult<String> {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..len_bytes).map(|_| rng.gen()).collect();
    if random_bytes.len() != len_bytes {
        return Err(AuthError::Pkce("random source produced short output".to_string()));
    }
    Ok(base64_url_encode(&random_bytes))
}

/// Generate a cryptographically secure code verifier
///
/// # Errors
/// Returns `AuthError::Pkce` if random number generation fails
pub fn generate_code_verifier() -> AuthResult<String> {
    generate_random_string(CODE_VERIFIER_BYTES)
}

/// Generate the code challenge for a verifier
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier)))
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    base64_url_encode(&hash)
}

/// Generate a random state token for CSRF protection
///
/// # Errors
/// Returns `AuthError::Pkce` if random number generation fails
pub fn generate_state() -> AuthResult<String> {
    generate_random_string(STATE_BYTES)
}

/// Recompute the challenge from a verifier and compare
///
/// Self-test helper only: the authorization server performs the real
/// verification at token-exchange time.
#[must_use]
pub fn verify_pkce(verifier: &str, challenge: &str) -> bool {
    generate_code_challenge(verifier) == challenge
}

/// PKCE challenge pair for one login attempt
///
/// The verifier is kept secret until token exchange; the challenge is sent
/// in the authorization request for server-side validation.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string (43-128 chars, base64url encoded)
    pub verifier: String,

    /// SHA-256 hash of the verifier (base64url encoded)
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair with cryptographically secure random values
    ///
    /// # Errors
    /// Returns `AuthError::Pkce` if the random source fails
    pub fn generate() -> AuthResult<Self> {
        let verifier = generate_code_verifier()?;
        let challenge = generate_code_challenge(&verifier);

        Ok(Self { verifier, challenge })
    }

    /// Challenge method (always "S256" for SHA-256)
    #[must_use]
    pub fn method(&self) -> &'static str {
        "S256"
    }
}
