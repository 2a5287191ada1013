//! Token lifecycle manager.
//!
//! Thin façade over exactly one [`TokenStore`]: pass-through storage
//! operations plus derived lifecycle answers (valid? expiring soon? which
//! tokens are present?). Expiry questions delegate to the [`crate::jwt`]
//! validator, so "cannot tell" always reads as "not usable".

use std::sync::Arc;

use tracing::warn;

use crate::error::AuthResult;
use crate::jwt;
use crate::store::TokenStore;
use crate::types::TokenSet;

/// Lifecycle façade over one token store
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
}

impl TokenManager {
    /// Create a manager over the given store
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Store a token record (pass-through; the store stamps `issued_at`)
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store fails
    pub fn set_tokens(&self, tokens: &TokenSet) -> AuthResult<()> {
        self.store.set_tokens(tokens)
    }

    /// Retrieve the stored record, if any (pass-through)
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store fails
    pub fn get_tokens(&self) -> AuthResult<Option<TokenSet>> {
        self.store.get_tokens()
    }

    /// Drop the stored record (pass-through)
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the store fails
    pub fn clear_tokens(&self) -> AuthResult<()> {
        self.store.clear_tokens()
    }

    fn tokens_or_none(&self) -> Option<TokenSet> {
        match self.store.get_tokens() {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Token store read failed, treating as absent: {e}");
                None
            }
        }
    }

    /// The stored access token, `None` when absent
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.tokens_or_none().map(|t| t.access_token)
    }

    /// The stored refresh token, `None` when absent
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens_or_none().and_then(|t| t.refresh_token)
    }

    /// The stored ID token, `None` when absent
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.tokens_or_none().and_then(|t| t.id_token)
    }

    /// Whether a token record with a non-empty access token exists
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.tokens_or_none().is_some_and(|t| !t.access_token.is_empty())
    }

    /// Whether an access token exists and is not expired within the buffer
    #[must_use]
    pub fn is_token_valid(&self, buffer_secs: i64) -> bool {
        self.access_token().is_some_and(|token| !jwt::is_token_expired(&token, buffer_secs))
    }

    /// Seconds until the access token expires; 0 when absent or undecodable
    #[must_use]
    pub fn time_until_expiration(&self) -> i64 {
        self.access_token().map_or(0, |token| jwt::get_time_until_expiration(&token))
    }

    /// Whether a proactive refresh is due
    ///
    /// True only while the token is still alive but inside the buffer window
    /// (`0 < remaining <= buffer_secs`). An already-expired token does not
    /// trigger this path; expiry is handled by the error path instead.
    #[must_use]
    pub fn should_refresh(&self, buffer_secs: i64) -> bool {
        let remaining = self.time_until_expiration();
        remaining > 0 && remaining <= buffer_secs
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the token manager.
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;

    use super::*;
    use crate::store::MemoryTokenStore;

    fn make_jwt_with_exp(exp_offset_secs: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let exp = Utc::now().timestamp() + exp_offset_secs;
        let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
        format!("{header}.{body}.signature")
    }

    fn manager_with(access_token: &str, refresh_token: Option<&str>) -> TokenManager {
        let manager = TokenManager::new(Arc::new(MemoryTokenStore::new()));
        let tokens = TokenSet::new(
            access_token.to_string(),
            refresh_token.map(ToString::to_string),
            Some("id_token".to_string()),
            3600,
            None,
        );
        manager.set_tokens(&tokens).unwrap();
        manager
    }

    /// Validates the derived accessors scenario.
    ///
    /// Assertions:
    /// - Confirms each accessor surfaces the stored value.
    /// - Ensures every accessor is `None` on an empty store.
    #[test]
    fn test_accessors() {
        let manager = manager_with("access_123", Some("refresh_456"));
        assert_eq!(manager.access_token().as_deref(), Some("access_123"));
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh_456"));
        assert_eq!(manager.id_token().as_deref(), Some("id_token"));

        let empty = TokenManager::new(Arc::new(MemoryTokenStore::new()));
        assert!(empty.access_token().is_none());
        assert!(empty.refresh_token().is_none());
        assert!(empty.id_token().is_none());
    }

    /// Validates `TokenManager::has_tokens` behavior for the empty access
    /// token scenario.
    ///
    /// Assertions:
    /// - Ensures a record with an empty access token does not count.
    /// - Ensures a non-empty access token does.
    #[test]
    fn test_has_tokens() {
        let manager = manager_with("access_123", None);
        assert!(manager.has_tokens());

        let empty_access = manager_with("", None);
        assert!(!empty_access.has_tokens());

        let no_record = TokenManager::new(Arc::new(MemoryTokenStore::new()));
        assert!(!no_record.has_tokens());
    }

    /// Validates `TokenManager::is_token_valid` behavior for the expiry
    /// delegation scenario.
    ///
    /// Assertions:
    /// - Confirms a live token is valid at buffer 0 and inside the window at
    ///   buffer 0 but not at a buffer spanning its lifetime.
    /// - Ensures an opaque (non-JWT) access token reads as invalid.
    /// - Ensures an empty store reads as invalid.
    #[test]
    fn test_is_token_valid() {
        let live = manager_with(&make_jwt_with_exp(3600), None);
        assert!(live.is_token_valid(0));
        assert!(!live.is_token_valid(7200));

        let opaque = manager_with("not-a-jwt", None);
        assert!(!opaque.is_token_valid(0));

        let empty = TokenManager::new(Arc::new(MemoryTokenStore::new()));
        assert!(!empty.is_token_valid(0));
    }

    /// Validates `TokenManager::should_refresh` behavior for the strict
    /// window scenario: `0 < remaining <= buffer`.
    ///
    /// Assertions:
    /// - Ensures a token far from expiry does not trigger a refresh.
    /// - Ensures a token inside the buffer window does.
    /// - Ensures an already-expired token does not (error path handles it).
    /// - Ensures an empty store does not.
    #[test]
    fn test_should_refresh_window() {
        let far = manager_with(&make_jwt_with_exp(3600), None);
        assert!(!far.should_refresh(300));

        let soon = manager_with(&make_jwt_with_exp(120), None);
        assert!(soon.should_refresh(300));

        let expired = manager_with(&make_jwt_with_exp(-100), None);
        assert!(!expired.should_refresh(300));

        let empty = TokenManager::new(Arc::new(MemoryTokenStore::new()));
        assert!(!empty.should_refresh(300));
    }

    /// Validates `TokenManager::time_until_expiration` behavior for the
    /// sentinel scenarios.
    ///
    /// Assertions:
    /// - Confirms the remaining lifetime of a live token.
    /// - Ensures 0 for an absent or undecodable access token.
    #[test]
    fn test_time_until_expiration() {
        let live = manager_with(&make_jwt_with_exp(3600), None);
        let remaining = live.time_until_expiration();
        assert!(remaining > 3590 && remaining <= 3600);

        let opaque = manager_with("not-a-jwt", None);
        assert_eq!(opaque.time_until_expiration(), 0);

        let empty = TokenManager::new(Arc::new(MemoryTokenStore::new()));
        assert_eq!(empty.time_until_expiration(), 0);
    }
}
