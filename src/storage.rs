//! Credential storage backends.
//!
//! The lifecycle manager itself never touches a store: every operation
//! takes a credential snapshot and returns a new one, and the caller
//! owns persistence. These backends are the ready-made implementations
//! of that caller-side responsibility, behind the [`CredentialStore`]
//! trait:
//! - [`FileCredentialStore`] - one JSON file per credential key
//! - [`MemoryCredentialStore`] - in-memory, for tests and ephemeral sessions
//! - [`KeyringCredentialStore`] - system keyring (requires the
//!   `system-keyring` feature)
//!
//! All operations are synchronous and take a `key` naming the logical
//! credential, e.g. `"google"` or a client-id/account pair. Callers
//! wanting single-flight refresh semantics should serialize access per
//! key around the manager; the store does not do it for them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::instrument;

use crate::credential::Credential;
use crate::error::{Error, Result};

// =============================================================================
// CredentialStore trait
// =============================================================================

/// Trait for credential storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`). Keys are
/// caller-chosen identifiers; one store can hold credentials for any
/// number of providers or accounts side by side.
pub trait CredentialStore: Send + Sync {
    /// Load the stored credential for a key, if any.
    fn load(&self, key: &str) -> Result<Option<Credential>>;

    /// Save a credential under a key.
    fn save(&self, key: &str, credential: &Credential) -> Result<()>;

    /// Remove the stored credential for a key.
    fn remove(&self, key: &str) -> Result<()>;

    /// Check whether a credential exists for a key.
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.load(key)?.is_some())
    }

    /// Get the name of this storage backend.
    fn name(&self) -> &str;
}

// Blanket implementation for Arc<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<Credential>> {
        (**self).load(key)
    }
    fn save(&self, key: &str, credential: &Credential) -> Result<()> {
        (**self).save(key, credential)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// Blanket implementation for Box<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn load(&self, key: &str) -> Result<Option<Credential>> {
        (**self).load(key)
    }
    fn save(&self, key: &str, credential: &Credential) -> Result<()> {
        (**self).save(key, credential)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// =============================================================================
// FileCredentialStore
// =============================================================================

/// File permissions for credential files (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// File-based credential storage.
///
/// Stores each credential as a JSON file at `{dir}/{key}.json`. Keys
/// become file names, so keep them to simple identifiers without path
/// separators.
///
/// # Security
/// - Credential files are created with 0600 permissions on Unix
/// - The directory is created with 0700 permissions
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    /// Directory where credential files live.
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory credentials are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                Error::Storage(format!(
                    "Failed to create credential directory '{}': {}",
                    self.dir.display(),
                    e
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(DIR_MODE);
                std::fs::set_permissions(&self.dir, perms).map_err(|e| {
                    Error::Storage(format!(
                        "Failed to set directory permissions on '{}': {}",
                        self.dir.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<Credential>> {
        let path = self.key_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read credential file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            Error::Storage(format!(
                "Failed to parse credential file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(Some(credential))
    }

    #[instrument(skip(self, credential))]
    fn save(&self, key: &str, credential: &Credential) -> Result<()> {
        self.ensure_dir()?;

        let path = self.key_path(key);
        let content = serde_json::to_string_pretty(credential)
            .map_err(|e| Error::Storage(format!("Failed to serialize credential: {}", e)))?;

        // Write to a temp file first, then rename for atomicity.
        // On Unix the 0600 mode is set at creation time so there is no
        // window where the tokens are readable by other users.
        let temp_path = path.with_extension("tmp");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&temp_path)
                .map_err(|e| {
                    Error::Storage(format!(
                        "Failed to create temp file '{}': {}",
                        temp_path.display(),
                        e
                    ))
                })?;
            file.write_all(content.as_bytes()).map_err(|e| {
                Error::Storage(format!(
                    "Failed to write temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().map_err(|e| {
                Error::Storage(format!(
                    "Failed to sync temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&temp_path, &content).map_err(|e| {
                Error::Storage(format!(
                    "Failed to write temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(Error::Storage(format!(
                "Failed to rename '{}' to '{}': {}",
                temp_path.display(),
                path.display(),
                e
            )));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!(
                "Failed to remove credential file '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_path(key).exists())
    }

    fn name(&self) -> &str {
        "file"
    }
}

// =============================================================================
// KeyringCredentialStore
// =============================================================================

/// Keyring-based credential storage.
///
/// Uses the system's native credential store. Credentials are
/// serialized to JSON before storage.
///
/// Feature-gated behind `system-keyring`.
#[cfg(feature = "system-keyring")]
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    /// Service name for keyring entries.
    service: String,
}

#[cfg(feature = "system-keyring")]
impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "system-keyring")]
impl KeyringCredentialStore {
    /// Service name for keyring entries.
    const SERVICE_NAME: &'static str = "token-steward";

    /// Create a store with the default service name.
    pub fn new() -> Self {
        Self {
            service: Self::SERVICE_NAME.to_string(),
        }
    }

    /// Create a store with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check whether the system keyring is usable on this machine.
    pub fn is_available() -> bool {
        match keyring::Entry::new("token-steward-test", "availability-check") {
            Ok(entry) => match entry.get_password() {
                Ok(_) => true,
                Err(keyring::Error::NoEntry) => true,
                Err(keyring::Error::NoStorageAccess(_)) => false,
                Err(keyring::Error::PlatformFailure(_)) => false,
                Err(_) => true,
            },
            Err(_) => false,
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| Error::Storage(format!("Failed to create keyring entry: {}", e)))
    }
}

#[cfg(feature = "system-keyring")]
impl CredentialStore for KeyringCredentialStore {
    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<Credential>> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(password) => {
                let credential: Credential = serde_json::from_str(&password).map_err(|e| {
                    Error::Storage(format!("Failed to parse credential from keyring: {}", e))
                })?;
                Ok(Some(credential))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Keyring error: {}", e))),
        }
    }

    #[instrument(skip(self, credential))]
    fn save(&self, key: &str, credential: &Credential) -> Result<()> {
        let entry = self.entry(key)?;
        let json = serde_json::to_string(credential)
            .map_err(|e| Error::Storage(format!("Failed to serialize credential: {}", e)))?;
        entry
            .set_password(&json)
            .map_err(|e| Error::Storage(format!("Keyring error: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<()> {
        let entry = self.entry(key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Storage(format!("Keyring error: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}

// =============================================================================
// MemoryCredentialStore
// =============================================================================

/// In-memory credential storage.
///
/// `Arc<RwLock<HashMap>>` underneath, so clones share state and the
/// store can be handed around the application. Useful for tests and
/// sessions that should leave nothing behind.
#[derive(Debug, Clone)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<String, Credential>>>,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a store seeded with one credential.
    pub fn with_credential(key: impl Into<String>, credential: Credential) -> Self {
        let mut map = HashMap::new();
        map.insert(key.into(), credential);
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").len()
    }

    /// Check whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("lock poisoned").is_empty()
    }

    /// Drop all stored credentials.
    pub fn clear(&self) {
        self.inner.write().expect("lock poisoned").clear();
    }
}

impl CredentialStore for MemoryCredentialStore {
    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<Credential>> {
        let guard = self.inner.read().expect("lock poisoned");
        Ok(guard.get(key).cloned())
    }

    #[instrument(skip(self, credential))]
    fn save(&self, key: &str, credential: &Credential) -> Result<()> {
        let mut guard = self.inner.write().expect("lock poisoned");
        guard.insert(key.to_string(), credential.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.inner.write().expect("lock poisoned");
        guard.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let guard = self.inner.read().expect("lock poisoned");
        Ok(guard.contains_key(key))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
