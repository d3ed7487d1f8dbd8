//! # Credential Token Persistence
//!
//! Tokens are cached across runs so a process does not have to log in every
//! time it starts. Entries are keyed by client instance (`username@address`).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("I/O error on token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed token file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable storage for credential tokens.
pub trait TokenStore: Send + Sync {
    /// Returns the stored token for `instance`, if any.
    fn load(&self, instance: &str) -> Result<Option<String>, TokenStoreError>;

    /// Stores `token` for `instance`, replacing any previous value.
    fn save(&self, instance: &str, token: &str) -> Result<(), TokenStoreError>;

    fn remove(&self, instance: &str) -> Result<(), TokenStoreError>;
}

/// Tokens kept in a JSON object on disk, one entry per instance.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, TokenStoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(TokenStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|source| TokenStoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes to a sibling temp file, then renames over the target.
    fn write_all(&self, tokens: &BTreeMap<String, String>) -> Result<(), TokenStoreError> {
        let io_err = |source| TokenStoreError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(tokens).map_err(|source| TokenStoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp_path, &self.path).map_err(io_err)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, instance: &str) -> Result<Option<String>, TokenStoreError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(instance))
    }

    fn save(&self, instance: &str, token: &str) -> Result<(), TokenStoreError> {
        let _guard = self.lock.lock();
        let mut tokens = self.read_all()?;
        tokens.insert(instance.to_string(), token.to_string());
        self.write_all(&tokens)
    }

    fn remove(&self, instance: &str) -> Result<(), TokenStoreError> {
        let _guard = self.lock.lock();
        let mut tokens = self.read_all()?;
        if tokens.remove(instance).is_some() {
            self.write_all(&tokens)?;
        }
        Ok(())
    }
}

/// Process-local store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, instance: &str) -> Result<Option<String>, TokenStoreError> {
        Ok(self.tokens.lock().get(instance).cloned())
    }

    fn save(&self, instance: &str, token: &str) -> Result<(), TokenStoreError> {
        self.tokens
            .lock()
            .insert(instance.to_string(), token.to_string());
        Ok(())
    }

    fn remove(&self, instance: &str) -> Result<(), TokenStoreError> {
        self.tokens.lock().remove(instance);
        Ok(())
    }
}
