//! Persisted auth credential.
//!
//! The session token is the only state that outlives the process. It lives
//! in one durable slot: written on login/register, read at startup and on
//! every authenticated request, deleted on logout or failed validation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::sync::lock;

/// Errors from the credential slot.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Reading or writing the token file failed.
    #[error("credential storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Refused to persist an empty token.
    #[error("refusing to store an empty auth token")]
    Empty,
}

/// Bearer token issued by the backend.
///
/// Wraps a [`SecretString`] so the value never shows up in `Debug` output
/// or logs.
#[derive(Clone)]
pub struct AuthToken(SecretString);

impl AuthToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// A single durable slot holding the auth token.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the backing storage cannot be read.
    fn load(&self) -> Result<Option<AuthToken>, CredentialError>;

    /// Persist `token`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the token is empty or cannot be written.
    fn save(&self, token: &AuthToken) -> Result<(), CredentialError>;

    /// Delete the persisted token. Deleting an absent token is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the backing storage cannot be modified.
    fn clear(&self) -> Result<(), CredentialError>;
}

// =============================================================================
// File-backed store
// =============================================================================

/// Token persisted in a single file (mode `0600` on Unix).
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<AuthToken>, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(AuthToken::new(token)))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, token: &AuthToken) -> Result<(), CredentialError> {
        if token.expose().trim().is_empty() {
            return Err(CredentialError::Empty);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        fs::write(&self.path, token.expose()).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local slot. Used by tests and by embedders that manage
/// persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `token` already persisted.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<AuthToken>, CredentialError> {
        Ok(lock(&self.slot).as_deref().map(AuthToken::new))
    }

    fn save(&self, token: &AuthToken) -> Result<(), CredentialError> {
        if token.expose().trim().is_empty() {
            return Err(CredentialError::Empty);
        }
        *lock(&self.slot) = Some(token.expose().to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        lock(&self.slot).take();
        Ok(())
    }
}
