//! Key-value storage backends for locally persisted credentials.
//!
//! The credential store depends only on the [`KeyValueStorage`] trait; the
//! host picks a backend at startup (durable file storage on desktop,
//! in-memory storage for ephemeral environments and tests).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("could not determine a data directory for this platform")]
    NoDataDir,
}

/// Minimal durable key-value capability: `get`, `set`, `delete`.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// File-per-key storage rooted in a per-installation directory.
///
/// Values land in plain files with restrictive permissions; the file should
/// be readable by the owning user only.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> Self {
        fs::create_dir_all(&root).ok();
        Self { root }
    }

    /// Opens the default per-installation store under the platform data dir.
    pub fn open_default() -> Result<Self, StorageError> {
        let base = directories::BaseDirs::new().ok_or(StorageError::NoDataDir)?;
        Ok(Self::new(base.data_dir().join("sana")))
    }

    /// A throwaway store under the system temp dir, for smoke runs.
    pub fn ephemeral() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("sana-{}", Uuid::new_v4()));
        Self::new(path)
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &std::path::Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &std::path::Path) -> io::Result<()> {
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.entry_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        let path = self.entry_path(key);
        fs::write(&path, value)?;
        Self::restrict_permissions(&path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local storage for environments without a durable secure store.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
