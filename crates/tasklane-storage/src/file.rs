//! File-backed storage backend.
//!
//! Each key is stored as `{state_dir}/{key}.json`. Writes go to a temporary
//! sibling file first and are renamed into place, so a crash mid-write never
//! leaves a truncated value behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::backend::{validate_key, StateStorage};
use crate::error::{StorageError, StorageResult};

/// Default directory for persisted state.
pub const DEFAULT_STATE_DIR: &str = ".tasklane";

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON file per key
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let state_dir = match std::env::var("TASKLANE_STATE_DIR") {
            Ok(dir) if dir.trim().is_empty() => {
                return Err(StorageError::config_error("TASKLANE_STATE_DIR is empty"));
            }
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(DEFAULT_STATE_DIR),
        };
        Ok(Self { state_dir })
    }
}

/// Stores each key as a JSON file in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.state_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StateStorage for FileStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No stored state");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        if tokio::fs::metadata(&self.root).await.is_err() {
            tokio::fs::create_dir_all(&self.root).await?;
            info!(dir = %self.root.display(), "Created state directory");
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(StorageError::write_failed(format!(
                "rename {} -> {}: {}",
                tmp.display(),
                path.display(),
                e
            )));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
