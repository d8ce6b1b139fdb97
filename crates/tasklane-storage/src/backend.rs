//! Storage backend trait and JSON helpers.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Maximum accepted key length.
const MAX_KEY_LEN: usize = 128;

/// A string-keyed blob store, the equivalent of browser local storage.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    async fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Validate a storage key.
///
/// Keys are limited to ASCII alphanumerics, `-`, `_` and `.`, must not start
/// with `.`, and must be at most 128 bytes.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(StorageError::invalid_key(key));
    }
    if key.starts_with('.') {
        return Err(StorageError::invalid_key(key));
    }
    let valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Load and decode a JSON value.
pub async fn load_json<T: DeserializeOwned>(
    storage: &dyn StateStorage,
    key: &str,
) -> StorageResult<Option<T>> {
    match storage.load(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)?;
            debug!(key = %key, backend = storage.name(), "Loaded JSON state");
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Encode and store a JSON value.
pub async fn save_json<T: Serialize + ?Sized>(
    storage: &dyn StateStorage,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value)?;
    storage.save(key, &raw).await?;
    debug!(key = %key, backend = storage.name(), bytes = raw.len(), "Saved JSON state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_plain_names() {
        assert!(validate_key("subscription-storage").is_ok());
        assert!(validate_key("tenant_42.v1").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_paths_and_empty() {
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("space key").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }
}
