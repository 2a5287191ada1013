//! JWT payload decoding and expiry/claim validation.
//!
//! This module performs basic JWT parsing without signature verification.
//! The decoded claims are a non-authoritative view: callers must never treat
//! them as proof of authenticity (the authorization server is the trust
//! boundary; tokens arrive over HTTPS).
//!
//! The predicate helpers never panic or return errors. A token that cannot
//! be decoded is reported as expired/invalid so that callers can treat
//! "can't tell" as "not usable".

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Audience claim: a single string or an array of strings
///
/// RFC 7519 allows both forms; a bare string is treated as a singleton set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience value
    One(String),
    /// Multiple audience values
    Many(Vec<String>),
}

impl Audience {
    /// Whether the given value is a member of this audience set
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(aud) => aud == value,
            Self::Many(auds) => auds.iter().any(|aud| aud == value),
        }
    }
}

/// Decoded JWT payload claims
///
/// Ephemeral and derived: recomputed on demand, never persisted. Claims
/// outside the registered set land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedClaims {
    /// Subject (unique user identifier)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience (string or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration timestamp (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// JWT ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Any remaining claims (email, name, picture, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DecodedClaims {
    /// Whether a claim with the given name is present
    #[must_use]
    pub fn has_claim(&self, name: &str) -> bool {
        match name {
            "sub" => self.sub.is_some(),
            "iss" => self.iss.is_some(),
            "aud" => self.aud.is_some(),
            "exp" => self.exp.is_some(),
            "iat" => self.iat.is_some(),
            "nbf" => self.nbf.is_some(),
            "jti" => self.jti.is_some(),
            other => self.extra.contains_key(other),
        }
    }

    /// Whether the claims are expired within `buffer_secs` of now
    ///
    /// A missing `exp` claim counts as expired (fail-safe default).
    #[must_use]
    pub fn is_expired(&self, buffer_secs: i64) -> bool {
        match self.exp {
            Some(exp) => now_unix() >= exp - buffer_secs,
            None => true,
        }
    }

    /// Seconds until expiry, clamped at zero
    #[must_use]
    pub fn time_until_expiration(&self) -> i64 {
        self.exp.map_or(0, |exp| (exp - now_unix()).max(0))
    }
}

/// Options for [`validate_token`]
///
/// Checks are applied in order: expiration, required claims, issuer,
/// audience. Unset options are skipped.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Reject expired tokens
    pub check_expiration: bool,
    /// Claims that must be present by name
    pub required_claims: Vec<String>,
    /// Expected issuer (exact equality)
    pub issuer: Option<String>,
    /// Required audience membership
    pub audience: Option<String>,
}

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Decode a JWT payload without verifying the signature
///
/// # Errors
/// Returns `AuthError::InvalidToken` when the token does not have exactly
/// three dot-separated segments, the payload is not valid base64url, or the
/// decoded payload is not a JSON claims object.
pub fn decode_token(token: &str) -> AuthResult<DecodedClaims> {
    let parts: Vec<&str> = token.split('.').collect();

    if parts.len() != 3 {
        return Err(AuthError::InvalidToken(format!(
            "expected 3 dot-separated segments, got {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| AuthError::InvalidToken(format!("payload is not valid base64url: {e}")))?;

    serde_json::from_slice(&payload)
        .map_err(|e| AuthError::InvalidToken(format!("payload is not a claims object: {e}")))
}

/// Whether the token is expired within `buffer_secs` of now
///
/// Fail-safe: a token without an `exp` claim, or one that cannot be decoded
/// at all, is reported as expired.
#[must_use]
pub fn is_token_expired(token: &str, buffer_secs: i64) -> bool {
    match decode_token(token) {
        Ok(claims) => claims.is_expired(buffer_secs),
        Err(_) => true,
    }
}

/// The token's `exp` claim, or `None` when absent or undecodable
#[must_use]
pub fn get_token_expiration(token: &str) -> Option<i64> {
    decode_token(token).ok().and_then(|claims| claims.exp)
}

/// Seconds until the token expires, clamped at zero
///
/// Returns 0 when the claim is absent or the token cannot be decoded.
#[must_use]
pub fn get_time_until_expiration(token: &str) -> i64 {
    decode_token(token).map_or(0, |claims| claims.time_until_expiration())
}

/// Evaluate the token against the given options
///
/// Decodes once, then short-circuits through: expiration (if requested),
/// required-claims presence, issuer equality, audience membership. Any
/// decode or evaluation failure yields `false`; this never panics.
#[must_use]
pub fn validate_token(token: &str, options: &ValidationOptions) -> bool {
    let Ok(claims) = decode_token(token) else {
        return false;
    };

    if options.check_expiration && claims.is_expired(0) {
        return false;
    }

    if !options.required_claims.iter().all(|claim| claims.has_claim(claim)) {
        return false;
    }

    if let Some(issuer) = &options.issuer {
        if claims.iss.as_deref() != Some(issuer.as_str()) {
            return false;
        }
    }

    if let Some(audience) = &options.audience {
        match &claims.aud {
            Some(aud) if aud.contains(audience) => {}
            _ => return false,
        }
    }

    true
}
