//! Token persistence.
//!
//! The web front end keeps the pair in `localStorage` under the keys
//! `token` and `refreshToken`. [`TokenStore`] mirrors that contract: a
//! small synchronous key/value store read on every request. No expiry is
//! tracked client-side; the backend's `401` is the only expiry signal.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;

/// Errors raised by persistent token stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("Corrupt token file {path}: {source}")]
    Corrupt {
        /// File that could not be parsed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Storage keys, named after the browser `localStorage` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    /// Access token sent as `Authorization: Bearer`.
    Access,
    /// Refresh token exchanged on `401`.
    Refresh,
}

impl TokenKey {
    /// Storage key string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "token",
            Self::Refresh => "refreshToken",
        }
    }
}

/// Access token with its optional refresh token.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Access token.
    pub access: SecretString,
    /// Refresh token, if the backend issued one.
    pub refresh: Option<SecretString>,
}

/// A key/value store for the token pair.
///
/// Implementations must be cheap to read: the API client consults the store
/// before every request.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Read a token.
    fn get(&self, key: TokenKey) -> Option<SecretString>;

    /// Write a token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a persistent store cannot be written.
    fn set(&self, key: TokenKey, value: &SecretString) -> Result<(), StorageError>;

    /// Delete a token. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a persistent store cannot be written.
    fn remove(&self, key: TokenKey) -> Result<(), StorageError>;

    /// Persist a freshly issued pair.
    ///
    /// A pair without a refresh token keeps the previously stored one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a persistent store cannot be written.
    fn store_pair(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.set(TokenKey::Access, &pair.access)?;
        if let Some(refresh) = &pair.refresh {
            self.set(TokenKey::Refresh, refresh)?;
        }
        Ok(())
    }

    /// Remove both tokens.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a persistent store cannot be written.
    fn clear(&self) -> Result<(), StorageError> {
        self.remove(TokenKey::Access)?;
        self.remove(TokenKey::Refresh)
    }
}

fn lock(map: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    // Entries are plain strings, a panic mid-write cannot leave them half-updated.
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MemoryTokenStore
// =============================================================================

/// In-process token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a token pair.
    #[must_use]
    pub fn with_tokens(access: &str, refresh: Option<&str>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(TokenKey::Access.as_str().to_string(), access.to_string());
        if let Some(refresh) = refresh {
            entries.insert(TokenKey::Refresh.as_str().to_string(), refresh.to_string());
        }
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = lock(&self.entries).keys().cloned().collect();
        f.debug_struct("MemoryTokenStore")
            .field("keys", &keys)
            .finish()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Option<SecretString> {
        lock(&self.entries)
            .get(key.as_str())
            .map(|value| SecretString::from(value.clone()))
    }

    fn set(&self, key: TokenKey, value: &SecretString) -> Result<(), StorageError> {
        lock(&self.entries).insert(key.as_str().to_string(), value.expose_secret().to_string());
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StorageError> {
        lock(&self.entries).remove(key.as_str());
        Ok(())
    }
}

// =============================================================================
// FileTokenStore
// =============================================================================

/// Token store backed by a JSON file, the CLI's stand-in for `localStorage`.
///
/// The file holds `{"token": "...", "refreshToken": "..."}`. Writes go to a
/// sibling temp file first and are renamed into place.
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened token file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        restrict_permissions(&tmp).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    /// Apply a change, keeping memory and file in step: the in-memory map is
    /// only replaced once the new contents are on disk.
    fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        let mut next = entries.clone();
        apply(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Option<SecretString> {
        lock(&self.entries)
            .get(key.as_str())
            .map(|value| SecretString::from(value.clone()))
    }

    fn set(&self, key: TokenKey, value: &SecretString) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.as_str().to_string(), value.expose_secret().to_string());
        })
    }

    fn remove(&self, key: TokenKey) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key.as_str());
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_token_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("renomarket-{}-{name}", std::process::id()))
            .join("tokens.json")
    }

    #[test]
    fn test_memory_store_pair_and_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.get(TokenKey::Access).is_none());

        store
            .store_pair(&TokenPair {
                access: SecretString::from("a1"),
                refresh: Some(SecretString::from("r1")),
            })
            .unwrap();
        assert_eq!(store.get(TokenKey::Access).unwrap().expose_secret(), "a1");
        assert_eq!(store.get(TokenKey::Refresh).unwrap().expose_secret(), "r1");

        store.clear().unwrap();
        assert!(store.get(TokenKey::Access).is_none());
        assert!(store.get(TokenKey::Refresh).is_none());
    }

    #[test]
    fn test_pair_without_refresh_keeps_previous_refresh() {
        let store = MemoryTokenStore::with_tokens("a1", Some("r1"));
        store
            .store_pair(&TokenPair {
                access: SecretString::from("a2"),
                refresh: None,
            })
            .unwrap();
        assert_eq!(store.get(TokenKey::Access).unwrap().expose_secret(), "a2");
        assert_eq!(store.get(TokenKey::Refresh).unwrap().expose_secret(), "r1");
    }

    #[test]
    fn test_memory_store_debug_hides_values() {
        let store = MemoryTokenStore::with_tokens("very-secret-access", None);
        let debug = format!("{store:?}");
        assert!(debug.contains("token"));
        assert!(!debug.contains("very-secret-access"));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let path = temp_token_path("persist");
        let _ = std::fs::remove_file(&path);

        let store = FileTokenStore::open(&path).unwrap();
        store.set(TokenKey::Access, &SecretString::from("a1")).unwrap();
        store.set(TokenKey::Refresh, &SecretString::from("r1")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"refreshToken\""));

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.get(TokenKey::Access).unwrap().expose_secret(), "a1");

        reopened.clear().unwrap();
        let reopened = FileTokenStore::open(&path).unwrap();
        assert!(reopened.get(TokenKey::Refresh).is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let path = temp_token_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileTokenStore::open(&path),
            Err(StorageError::Corrupt { .. })
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let path = temp_token_path("unwritable");
        let dir = path.parent().unwrap().to_path_buf();
        let _ = std::fs::remove_dir_all(&dir);

        let store = FileTokenStore::open(&path).unwrap();
        store.set(TokenKey::Access, &SecretString::from("a1")).unwrap();

        // Replace the directory with a plain file so the next write fails.
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, "").unwrap();

        let err = store.set(TokenKey::Access, &SecretString::from("a2")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert_eq!(store.get(TokenKey::Access).unwrap().expose_secret(), "a1");
        assert!(store.remove(TokenKey::Access).is_err());
        assert!(store.get(TokenKey::Access).is_some());

        let _ = std::fs::remove_file(&dir);
    }
}
