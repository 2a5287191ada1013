//! OAuth 2.0 client for the authorization-code + PKCE flow.
//!
//! Drives the three-legged flow against Google: build the authorization
//! redirect, validate the callback, exchange the code, refresh, fetch the
//! profile, revoke. Network calls are plain request/response with no retry,
//! backoff, or client-enforced timeout; callers wrap with a deadline when
//! they need one.
//!
//! Per-login transient state (PKCE verifier, CSRF state nonce) lives in an
//! injected [`KeyValueMedium`] under the keys below. Entries are written at
//! login, overwriting any in-flight attempt, and deleted only after a fully
//! successful callback — failure paths leave them in place so diagnostics
//! can inspect the aborted attempt.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{self, DecodedClaims};
use crate::pkce::PkceChallenge;
use crate::store::KeyValueMedium;
use crate::types::{TokenResponse, TokenSet};
use crate::user::{GoogleUserInfo, UserProfile};

/// Transient-storage key for the PKCE code verifier
pub const PKCE_VERIFIER_KEY: &str = "pkce_verifier";

/// Transient-storage key for the CSRF state nonce
pub const OAUTH_STATE_KEY: &str = "oauth_state";

#[derive(Debug, serde::Deserialize)]
struct OAuthErrorBody {
    error: String,
    error_description: Option<String>,
}

/// OAuth 2.0 + PKCE client for Google sign-in
pub struct OAuthClient {
    config: AuthConfig,
    http: reqwest::Client,
    transient: Arc<dyn KeyValueMedium>,
}

impl OAuthClient {
    /// Create a client over the given configuration and transient medium
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfig` when the configuration is missing
    /// required values
    pub fn new(config: AuthConfig, transient: Arc<dyn KeyValueMedium>) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self { config, http: reqwest::Client::new(), transient })
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Begin a login attempt
    ///
    /// Generates a fresh PKCE pair and state nonce, persists both into
    /// transient storage (overwriting any in-flight attempt), and returns
    /// the authorization URL the caller must navigate to.
    ///
    /// # Errors
    /// Returns `AuthError::Pkce` when challenge generation fails and
    /// `AuthError::Storage` when the transient medium rejects the write
    pub fn start_login(&self) -> AuthResult<String> {
        let pkce = PkceChallenge::generate()?;
        let state = crate::pkce::generate_state()?;

        self.transient
            .set(PKCE_VERIFIER_KEY, &pkce.verifier)
            .map_err(|e| AuthError::Storage(format!("failed to persist code verifier: {e}")))?;
        self.transient
            .set(OAUTH_STATE_KEY, &state)
            .map_err(|e| AuthError::Storage(format!("failed to persist state nonce: {e}")))?;

        info!("Generated authorization URL for new login attempt");

        Ok(self.authorization_url(&pkce, &state))
    }

    fn authorization_url(&self, pkce: &PkceChallenge, state: &str) -> String {
        let scope = self.config.scope_string();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", pkce.method()),
            ("state", state),
            // Google only issues a refresh token for offline access with a
            // forced consent screen.
            ("access_type", "offline"),
            ("prompt", "consent"),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.endpoints.authorization, query)
    }

    /// Validate the provider callback and complete the login
    ///
    /// Steps run strictly in order: provider error check, state nonce
    /// validation, code presence, verifier recovery, code exchange, and (when
    /// an allow-list is configured) email-domain enforcement against the
    /// fetched profile. Both transient entries are deleted only once all of
    /// that has succeeded.
    ///
    /// # Errors
    /// Returns the typed error of whichever step failed; see the module docs
    /// for the transient-state policy on failure paths
    pub async fn handle_callback(&self, callback_url: &str) -> AuthResult<TokenSet> {
        let url = Url::parse(callback_url)
            .map_err(|e| AuthError::Callback(format!("unparsable callback URL: {e}")))?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if let Some(error) = params.get("error") {
            warn!(code = %error, "Provider rejected the authorization request");
            return Err(AuthError::AuthFailed(format!(
                "authorization rejected by provider: {error}"
            )));
        }

        let stored_state = self
            .transient
            .get(OAUTH_STATE_KEY)
            .map_err(|e| AuthError::Storage(format!("failed to read state nonce: {e}")))?
            .ok_or_else(|| {
                AuthError::InvalidState("no login attempt in progress".to_string())
            })?;

        match params.get("state") {
            Some(state) if *state == stored_state => {}
            Some(_) => {
                warn!("State nonce mismatch on callback");
                return Err(AuthError::InvalidState("state parameter mismatch".to_string()));
            }
            None => {
                return Err(AuthError::InvalidState(
                    "state parameter missing from callback".to_string(),
                ))
            }
        }

        let code = params.get("code").ok_or_else(|| {
            AuthError::AuthFailed("authorization code missing from callback".to_string())
        })?;

        let verifier = self
            .transient
            .get(PKCE_VERIFIER_KEY)
            .map_err(|e| AuthError::Storage(format!("failed to read code verifier: {e}")))?
            .ok_or_else(|| {
                AuthError::Pkce("code verifier missing from transient storage".to_string())
            })?;

        let tokens = self.exchange_code_for_tokens(code, &verifier).await?;

        if !self.config.allowed_domains.is_empty() {
            let profile = self.get_user_info(&tokens.access_token).await?;
            self.enforce_allowed_domain(&profile)?;
        }

        // Single-use: neither entry may survive a completed callback, even
        // if the medium refuses the deletes.
        let _ = self.transient.remove(PKCE_VERIFIER_KEY);
        let _ = self.transient.remove(OAUTH_STATE_KEY);

        info!("Login completed, token set obtained");

        Ok(tokens)
    }

    fn enforce_allowed_domain(&self, profile: &UserProfile) -> AuthResult<()> {
        let email = match profile.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => return Err(AuthError::AuthFailed("email not available".to_string())),
        };

        let Some(domain) = profile.email_domain() else {
            return Err(AuthError::AuthFailed(format!("invalid email format: {email}")));
        };

        if self.config.allowed_domains.iter().any(|allowed| allowed.eq_ignore_ascii_case(domain)) {
            Ok(())
        } else {
            Err(AuthError::DomainNotAllowed {
                domain: domain.to_string(),
                allowed: self.config.allowed_domains.clone(),
            })
        }
    }

    /// Exchange an authorization code plus verifier for a token set
    ///
    /// # Errors
    /// Returns `AuthError::Network` on transport failure and
    /// `AuthError::AuthFailed` on a non-2xx response, carrying the parsed
    /// error body's description when one is available
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        verifier: &str,
    ) -> AuthResult<TokenSet> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("client_id", self.config.client_id.clone()),
            ("code_verifier", verifier.to_string()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        debug!("Exchanging authorization code for tokens");
        let response = self.http.post(&self.config.endpoints.token).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::AuthFailed(token_endpoint_failure(response).await));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::AuthFailed(format!("malformed token response: {e}")))?;

        Ok(token_response.into_token_set(None))
    }

    /// Obtain a fresh token set from a refresh token
    ///
    /// An empty refresh token fails immediately without a network call. When
    /// the server omits a refresh token from the response, the old one is
    /// carried into the returned set so the session stays refreshable.
    ///
    /// # Errors
    /// Returns `AuthError::RefreshFailed` for an empty input or a non-2xx
    /// response and `AuthError::Network` on transport failure
    pub async fn refresh_tokens(&self, refresh_token: &str) -> AuthResult<TokenSet> {
        if refresh_token.is_empty() {
            return Err(AuthError::RefreshFailed("no refresh token available".to_string()));
        }

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", self.config.client_id.clone()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        debug!("Refreshing access token");
        let response = self.http.post(&self.config.endpoints.token).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::RefreshFailed(token_endpoint_failure(response).await));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("malformed token response: {e}")))?;

        info!("Access token refreshed");

        Ok(token_response.into_token_set(Some(refresh_token)))
    }

    /// Fetch the user's profile from the userinfo endpoint
    ///
    /// # Errors
    /// Returns `AuthError::UserFetch` on a non-2xx response or an
    /// unparsable profile and `AuthError::Network` on transport failure
    pub async fn get_user_info(&self, access_token: &str) -> AuthResult<UserProfile> {
        let response = self
            .http
            .get(&self.config.endpoints.userinfo)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::UserFetch(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::UserFetch(format!("malformed userinfo response: {e}")))?;

        Ok(info.into_profile())
    }

    /// Revoke a token, best effort
    ///
    /// The response status is intentionally ignored and transport failures
    /// are swallowed: logout always succeeds locally.
    pub async fn revoke_token(&self, token: &str) {
        let result = self
            .http
            .post(&self.config.endpoints.revocation)
            .form(&[("token", token)])
            .send()
            .await;

        match result {
            Ok(response) => debug!(status = %response.status(), "Revocation response ignored"),
            Err(e) => debug!("Revocation request failed, ignoring: {e}"),
        }
    }

    /// Whether a raw token decodes and is unexpired
    ///
    /// Convenience wrapper over the validator; reports `false` instead of
    /// propagating any failure.
    #[must_use]
    pub fn is_token_valid(&self, token: &str) -> bool {
        !jwt::is_token_expired(token, 0)
    }

    /// Decode a raw access token's payload without verifying the signature
    ///
    /// # Errors
    /// Returns `AuthError::InvalidToken` when the token cannot be decoded
    pub fn decode_access_token(&self, token: &str) -> AuthResult<DecodedClaims> {
        jwt::decode_token(token)
    }
}

/// Build the failure message for a non-2xx token-endpoint response:
/// the parsed error body's description when available, otherwise a message
/// embedding the HTTP status. A body that is not JSON must not turn into a
/// second failure.
async fn token_endpoint_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let fallback = format!("token endpoint returned {status}");

    match response.text().await {
        Ok(body) => match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(parsed) => parsed.error_description.unwrap_or(parsed.error),
            Err(_) => fallback,
        },
        Err(_) => fallback,
    }
}
