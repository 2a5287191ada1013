//! High-level auth session orchestrator.
//!
//! Combines the OAuth client and token manager into a single session object
//! and owns the proactive-refresh timer. The timer is one cancellable task
//! handle: replaced (old task aborted) whenever a new token set arrives and
//! aborted on logout, so overlapping refresh attempts cannot happen without
//! any mutex around the refresh itself.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info};

use crate::client::OAuthClient;
use crate::error::{AuthError, AuthResult};
use crate::manager::TokenManager;
use crate::types::TokenSet;

/// How long the refresh task sleeps when there is nothing to schedule
const IDLE_RECHECK_SECS: u64 = 60;

/// Auth session: one client, one manager, one refresh timer
///
/// Cheap to clone; clones share the same client, manager, and timer handle.
#[derive(Clone)]
pub struct AuthSession {
    client: Arc<OAuthClient>,
    manager: Arc<TokenManager>,
    refresh_buffer_secs: i64,
    refresh_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AuthSession {
    /// Create a session over the given client and manager
    ///
    /// The refresh buffer comes from the client's configuration.
    #[must_use]
    pub fn new(client: OAuthClient, manager: TokenManager) -> Self {
        let refresh_buffer_secs = client.config().refresh_buffer_secs;
        Self {
            client: Arc::new(client),
            manager: Arc::new(manager),
            refresh_buffer_secs,
            refresh_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Restore a previously persisted session at startup
    ///
    /// Returns `true` when a token record was found; the refresh timer is
    /// started in that case.
    pub fn initialize(&self) -> bool {
        if self.manager.has_tokens() {
            info!("Session restored from stored tokens");
            self.start_auto_refresh();
            true
        } else {
            debug!("No stored tokens to restore");
            false
        }
    }

    /// Begin a login attempt; returns the authorization URL to navigate to
    ///
    /// # Errors
    /// See [`OAuthClient::start_login`]
    pub fn start_login(&self) -> AuthResult<String> {
        self.client.start_login()
    }

    /// Complete a login from the provider callback
    ///
    /// Stores the obtained token set and restarts the refresh timer.
    ///
    /// # Errors
    /// See [`OAuthClient::handle_callback`]; storage failures surface as
    /// `AuthError::Storage`
    pub async fn complete_login(&self, callback_url: &str) -> AuthResult<TokenSet> {
        let tokens = self.client.handle_callback(callback_url).await?;
        self.manager.set_tokens(&tokens)?;
        self.start_auto_refresh();
        Ok(tokens)
    }

    /// Whether a usable token record is present
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.manager.has_tokens()
    }

    /// Current access token, refreshing first when it is due or expired
    ///
    /// # Errors
    /// Returns `AuthError::AuthFailed` when not logged in,
    /// `AuthError::TokenExpired` when expired with no refresh token, and the
    /// refresh error when a required refresh fails
    pub async fn access_token(&self) -> AuthResult<String> {
        if !self.manager.has_tokens() {
            return Err(AuthError::AuthFailed("not authenticated".to_string()));
        }

        if self.manager.should_refresh(self.refresh_buffer_secs) {
            self.refresh().await?;
        } else if !self.manager.is_token_valid(0) {
            // Expired outright: only a refresh token can save the session.
            if self.manager.refresh_token().is_some() {
                self.refresh().await?;
            } else {
                return Err(AuthError::TokenExpired);
            }
        }

        self.manager
            .access_token()
            .ok_or_else(|| AuthError::AuthFailed("not authenticated".to_string()))
    }

    /// Refresh the token set now and store the result
    ///
    /// # Errors
    /// Returns `AuthError::RefreshFailed` when no refresh token is stored or
    /// the grant fails
    pub async fn refresh(&self) -> AuthResult<()> {
        let refresh_token = self
            .manager
            .refresh_token()
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token available".to_string()))?;

        let tokens = self.client.refresh_tokens(&refresh_token).await?;
        self.manager.set_tokens(&tokens)?;
        Ok(())
    }

    /// Log out: cancel the refresh timer, best-effort revoke, clear the store
    ///
    /// Revocation never fails; only a store failure can surface here, and the
    /// timer is already cancelled by then.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` when clearing the store fails
    pub async fn logout(&self) -> AuthResult<()> {
        self.stop_auto_refresh();

        if let Some(access_token) = self.manager.access_token() {
            self.client.revoke_token(&access_token).await;
        }
        if let Some(refresh_token) = self.manager.refresh_token() {
            self.client.revoke_token(&refresh_token).await;
        }

        self.manager.clear_tokens()?;
        info!("Logged out, session cleared");
        Ok(())
    }

    /// The token manager, for lifecycle queries
    #[must_use]
    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    /// The OAuth client, for advanced operations
    #[must_use]
    pub fn client(&self) -> &OAuthClient {
        &self.client
    }

    /// Start (or restart) the proactive-refresh timer
    ///
    /// Any previously scheduled task is aborted first, so at most one
    /// refresh task exists per session.
    pub fn start_auto_refresh(&self) {
        let mut guard = self.refresh_task.lock();
        if let Some(handle) = guard.take() {
            handle.abort();
        }

        let session = self.clone();
        *guard = Some(tokio::spawn(async move {
            session.auto_refresh_loop().await;
        }));
        debug!("Refresh timer scheduled");
    }

    /// Cancel the proactive-refresh timer, if one is scheduled
    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self.refresh_task.lock().take() {
            handle.abort();
            debug!("Refresh timer cancelled");
        }
    }

    /// Whether a refresh timer is currently scheduled
    #[must_use]
    pub fn has_refresh_task(&self) -> bool {
        self.refresh_task.lock().is_some()
    }

    async fn auto_refresh_loop(&self) {
        loop {
            let remaining = self.manager.time_until_expiration();
            let wake_after = if remaining > self.refresh_buffer_secs {
                // Sleep until the token enters the refresh window.
                Duration::from_secs((remaining - self.refresh_buffer_secs).unsigned_abs())
            } else {
                Duration::from_secs(0)
            };

            if !wake_after.is_zero() {
                debug!(secs = wake_after.as_secs(), "Auto-refresh sleeping until window");
                tokio::time::sleep(wake_after).await;
            }

            if !self.manager.has_tokens() {
                // Logged out while sleeping; idle until cancelled or a new
                // record shows up.
                tokio::time::sleep(Duration::from_secs(IDLE_RECHECK_SECS)).await;
                continue;
            }

            if self.manager.should_refresh(self.refresh_buffer_secs)
                || !self.manager.is_token_valid(0)
            {
                info!("Auto-refresh: token entering expiry window, refreshing");
                if let Err(e) = self.refresh().await {
                    error!("Auto-refresh failed: {e}");
                    tokio::time::sleep(Duration::from_secs(IDLE_RECHECK_SECS)).await;
                }
            } else {
                // Refreshed elsewhere in the meantime; recompute the window.
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("refresh_buffer_secs", &self.refresh_buffer_secs)
            .field("has_refresh_task", &self.has_refresh_task())
            .finish()
    }
}
