//! Persisted session store
//!
//! A small string key-value store that survives restarts. The session keeps
//! three entries in it: the access token, the refresh token and the cached
//! user record.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use shared::{TokenPair, UserRecord};
use thiserror::Error;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// String-keyed persistent storage
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Process-local store; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        data.remove(key);
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// JSON file store.
///
/// The whole map is rewritten on every change; the file is deleted once the
/// last key is removed so a signed-out client leaves nothing behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), keys = data.len(), "Session store opened");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if data.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        data.insert(key.to_string(), value.to_string());
        self.flush(&data)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        if data.remove(key).is_some() {
            self.flush(&data)?;
        }
        Ok(())
    }
}

// ============================================================================
// PersistedSession
// ============================================================================

/// Typed view over the three session keys
#[derive(Clone)]
pub struct PersistedSession {
    store: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedSession").finish_non_exhaustive()
    }
}

impl PersistedSession {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(AUTH_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// Cached user record; an unreadable record counts as absent
    pub fn user(&self) -> Result<Option<UserRecord>, StoreError> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cached user record");
                Ok(None)
            }
        }
    }

    pub fn save_tokens(&self, tokens: &TokenPair) -> Result<(), StoreError> {
        self.store.set(AUTH_TOKEN_KEY, &tokens.access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)
    }

    pub fn save_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &json)
    }

    pub fn remove_user(&self) -> Result<(), StoreError> {
        self.store.remove(USER_KEY)
    }

    /// Remove every session key
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(AUTH_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.store.remove(USER_KEY)
    }

    /// True when no session key is present
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.access_token()?.is_none()
            && self.refresh_token()?.is_none()
            && self.store.get(USER_KEY)?.is_none())
    }
}
