//! Storage trait definitions.

use crate::StorageResult;

/// A secret store holding string values under `(service, key)`.
pub trait SecureStorage: Send + Sync {
    /// The service every key of this store lives under.
    fn service(&self) -> &str;

    /// Store a value, replacing any existing value in one operation.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns false if there was nothing to delete.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
