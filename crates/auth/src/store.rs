//! Token storage: one contract, three interchangeable variants.
//!
//! The contract is [`TokenStore`]: `set_tokens` stamps `issued_at` with the
//! current wall-clock time (overwriting any caller-supplied value),
//! `get_tokens` hands back an independent copy, and `clear_tokens` drops the
//! record wholesale.
//!
//! The session and persistent variants are layered on an injected
//! [`KeyValueMedium`] capability rather than an ambient global, so the core
//! is testable with fakes. The medium decides the actual lifetime:
//! [`InMemoryMedium`] gives session-scoped semantics, [`FileMedium`] survives
//! process restarts.
//!
//! Two stores pointed at the same medium and key share state. The core
//! assumes a single logical writer per record and adds no cross-instance
//! locking; concurrent writers racing on one key is an accepted limitation,
//! not a guarantee.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::DEFAULT_TOKEN_STORAGE_KEY;
use crate::error::{AuthError, AuthResult};
use crate::types::TokenSet;

/// Durable holder of the current token set
pub trait TokenStore: Send + Sync {
    /// Store a token record, stamping `issued_at` with the current time
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the underlying medium fails
    fn set_tokens(&self, tokens: &TokenSet) -> AuthResult<()>;

    /// Retrieve an independent copy of the stored record, if any
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the underlying medium fails
    fn get_tokens(&self) -> AuthResult<Option<TokenSet>>;

    /// Drop the stored record
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the underlying medium fails
    fn clear_tokens(&self) -> AuthResult<()>;
}

/// Key-value storage capability with get/set/remove semantics
///
/// Injected into the medium-backed stores and the OAuth client's transient
/// state. Errors are plain strings; the stores wrap them into
/// `AuthError::Storage`.
pub trait KeyValueMedium: Send + Sync {
    /// Read the value under `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    /// Write `value` under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
    /// Remove the entry under `key` (absent entries are not an error)
    fn remove(&self, key: &str) -> Result<(), String>;
}

/// Process-local medium; lifetime of the instance
///
/// Backs session-scoped storage and the transient per-login entries.
#[derive(Debug, Default)]
pub struct InMemoryMedium {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryMedium {
    /// Create an empty medium
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueMedium for InMemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Durable medium backed by a JSON file; survives process restarts
///
/// The whole map is rewritten on every mutation, which is fine for the
/// handful of small entries this library stores.
#[derive(Debug)]
pub struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    /// Create a medium persisting to `path` (created on first write)
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>, String> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("failed to read {}: {e}", self.path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("failed to parse {}: {e}", self.path.display()))
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), String> {
        let raw = serde_json::to_string(entries)
            .map_err(|e| format!("failed to serialize entries: {e}"))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| format!("failed to write {}: {e}", self.path.display()))
    }
}

impl KeyValueMedium for FileMedium {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

fn stamp_issued_at(tokens: &TokenSet) -> TokenSet {
    let mut stamped = tokens.clone();
    stamped.issued_at = Some(Utc::now());
    stamped
}

/// In-memory store: data never leaves managed memory
///
/// Lifetime is the store instance; two instances never share state. Immune
/// to script-injection-class attacks on persisted media by construction.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenSet>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set_tokens(&self, tokens: &TokenSet) -> AuthResult<()> {
        *self.tokens.lock() = Some(stamp_issued_at(tokens));
        debug!("Token record stored in memory");
        Ok(())
    }

    fn get_tokens(&self) -> AuthResult<Option<TokenSet>> {
        Ok(self.tokens.lock().clone())
    }

    fn clear_tokens(&self) -> AuthResult<()> {
        *self.tokens.lock() = None;
        debug!("Token record cleared from memory");
        Ok(())
    }
}

/// Shared implementation for the medium-backed variants
struct MediumBackedStore {
    medium: Arc<dyn KeyValueMedium>,
    key: String,
}

impl MediumBackedStore {
    fn new(medium: Arc<dyn KeyValueMedium>, key: String) -> AuthResult<Self> {
        // Probe the medium up front so an absent/broken backend fails at
        // construction, not at first use.
        medium
            .get(&key)
            .map_err(|e| AuthError::Storage(format!("storage medium unavailable: {e}")))?;

        Ok(Self { medium, key })
    }

    fn set_tokens(&self, tokens: &TokenSet) -> AuthResult<()> {
        let stamped = stamp_issued_at(tokens);
        let raw = serde_json::to_string(&stamped)
            .map_err(|e| AuthError::Storage(format!("failed to serialize token record: {e}")))?;
        self.medium
            .set(&self.key, &raw)
            .map_err(|e| AuthError::Storage(format!("failed to write token record: {e}")))?;
        debug!(key = %self.key, "Token record stored");
        Ok(())
    }

    fn get_tokens(&self) -> AuthResult<Option<TokenSet>> {
        let raw = self
            .medium
            .get(&self.key)
            .map_err(|e| AuthError::Storage(format!("failed to read token record: {e}")))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                // Self-heal: a corrupted record is unusable, drop it rather
                // than failing every future read.
                warn!(key = %self.key, "Stored token record is corrupted, clearing: {e}");
                let _ = self.medium.remove(&self.key);
                Ok(None)
            }
        }
    }

    fn clear_tokens(&self) -> AuthResult<()> {
        self.medium
            .remove(&self.key)
            .map_err(|e| AuthError::Storage(format!("failed to clear token record: {e}")))?;
        debug!(key = %self.key, "Token record cleared");
        Ok(())
    }
}

/// Session-scoped store over an injected medium
///
/// Same contract as the other variants; the backing medium is expected to
/// live for the host session (reloads survive, independent launches do not).
pub struct SessionTokenStore {
    inner: MediumBackedStore,
}

impl SessionTokenStore {
    /// Create a store under the default storage key
    ///
    /// # Errors
    /// Returns `AuthError::Storage` when the medium probe fails
    pub fn new(medium: Arc<dyn KeyValueMedium>) -> AuthResult<Self> {
        Self::with_key(medium, DEFAULT_TOKEN_STORAGE_KEY)
    }

    /// Create a store under a custom storage key
    ///
    /// # Errors
    /// Returns `AuthError::Storage` when the medium probe fails
    pub fn with_key(medium: Arc<dyn KeyValueMedium>, key: impl Into<String>) -> AuthResult<Self> {
        Ok(Self { inner: MediumBackedStore::new(medium, key.into())? })
    }
}

impl TokenStore for SessionTokenStore {
    fn set_tokens(&self, tokens: &TokenSet) -> AuthResult<()> {
        self.inner.set_tokens(tokens)
    }

    fn get_tokens(&self) -> AuthResult<Option<TokenSet>> {
        self.inner.get_tokens()
    }

    fn clear_tokens(&self) -> AuthResult<()> {
        self.inner.clear_tokens()
    }
}

/// Durable store over an injected medium; survives process restarts
///
/// Identical contract and failure handling to [`SessionTokenStore`], backed
/// by a durable medium such as [`FileMedium`].
pub struct PersistentTokenStore {
    inner: MediumBackedStore,
}

impl PersistentTokenStore {
    /// Create a store under the default storage key
    ///
    /// # Errors
    /// Returns `AuthError::Storage` when the medium probe fails
    pub fn new(medium: Arc<dyn KeyValueMedium>) -> AuthResult<Self> {
        Self::with_key(medium, DEFAULT_TOKEN_STORAGE_KEY)
    }

    /// Create a store under a custom storage key
    ///
    /// # Errors
    /// Returns `AuthError::Storage` when the medium probe fails
    pub fn with_key(medium: Arc<dyn KeyValueMedium>, key: impl Into<String>) -> AuthResult<Self> {
        Ok(Self { inner: MediumBackedStore::new(medium, key.into())? })
    }
}

impl TokenStore for PersistentTokenStore {
    fn set_tokens(&self, tokens: &TokenSet) -> AuthResult<()> {
        self.inner.set_tokens(tokens)
    }

    fn get_tokens(&self) -> AuthResult<Option<TokenSet>> {
        self.inner.get_tokens()
    }

    fn clear_tokens(&self) -> AuthResult<()> {
        self.inner.clear_tokens()
    }
}
