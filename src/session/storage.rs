//! Persistent storage for the session credential.
//!
//! A single credential string survives process restarts under one fixed
//! key ([`CREDENTIAL_KEY`]). The session store treats every operation here
//! as best-effort.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;

/// Fixed key the credential is stored under (the file name on disk).
pub const CREDENTIAL_KEY: &str = "token";

/// Trait for reading and writing the persisted credential.
///
/// Implementations must be thread-safe. The session store never lets an
/// error from these methods propagate.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Read the stored credential, if any.
    async fn load(&self) -> Result<Option<String>, StorageError>;

    /// Replace the stored credential.
    async fn save(&self, credential: &str) -> Result<(), StorageError>;

    /// Remove the stored credential. Erasing when nothing is stored succeeds.
    async fn erase(&self) -> Result<(), StorageError>;

    /// Human-readable location, for logging.
    fn location(&self) -> &str;
}

// =============================================================================
// File storage
// =============================================================================

/// Stores the credential as `<dir>/token`.
pub struct FileCredentialStorage {
    dir: PathBuf,
    path: PathBuf,
    location: String,
}

impl FileCredentialStorage {
    /// Create storage rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(CREDENTIAL_KEY);
        let location = path.display().to_string();
        Self {
            dir,
            path,
            location,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStorage for FileCredentialStorage {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    return Err(StorageError::Corrupt("stored credential is empty".into()));
                }
                Ok(Some(token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    async fn save(&self, credential: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        tokio::fs::write(&self.path, credential)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        Ok(())
    }

    async fn erase(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    fn location(&self) -> &str {
        &self.location
    }
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Process-local storage; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStorage {
    value: RwLock<Option<String>>,
}

impl MemoryCredentialStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a credential, as if left by a previous run.
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(credential.into())),
        }
    }

    /// Current stored value.
    pub async fn stored(&self) -> Option<String> {
        self.value.read().await.clone()
    }
}

#[async_trait]
impl CredentialStorage for MemoryCredentialStorage {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.value.read().await.clone())
    }

    async fn save(&self, credential: &str) -> Result<(), StorageError> {
        *self.value.write().await = Some(credential.to_string());
        Ok(())
    }

    async fn erase(&self) -> Result<(), StorageError> {
        *self.value.write().await = None;
        Ok(())
    }

    fn location(&self) -> &str {
        "memory"
    }
}
