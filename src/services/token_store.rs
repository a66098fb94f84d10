// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence for the access/refresh token pair.
//!
//! Tokens are kept under the well-known keys `access_token` and
//! `refresh_token`. Operations are synchronous so that `logout` can clear
//! state without suspending.

use crate::error::SessionError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The persisted token pair. Either half may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_token: Some(access.into()),
            refresh_token: Some(refresh.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Backing storage for the session's token pair.
pub trait TokenStore: Send + Sync {
    /// Load the persisted pair. A store with nothing saved yields an empty pair.
    fn load(&self) -> Result<StoredTokens, SessionError>;

    /// Replace the persisted pair.
    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError>;

    /// Remove both tokens. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), SessionError>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn load(&self) -> Result<StoredTokens, SessionError> {
        (**self).load()
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError> {
        (**self).save(tokens)
    }

    fn clear(&self) -> Result<(), SessionError> {
        (**self).clear()
    }
}

/// In-memory store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token pair, as if persisted by an earlier run.
    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<StoredTokens, SessionError> {
        Ok(self.tokens.lock().clone())
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError> {
        *self.tokens.lock() = tokens.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.tokens.lock() = StoredTokens::default();
        Ok(())
    }
}

/// JSON file store so a session survives between runs of the CLI.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<StoredTokens, SessionError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredTokens::default()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&raw).map_err(|e| {
            SessionError::Storage(format!("Corrupt token file {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, tokens: &StoredTokens) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| SessionError::Storage(format!("Failed to encode tokens: {}", e)))?;
        std::fs::write(&self.path, json).map_err(|e| {
            SessionError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
