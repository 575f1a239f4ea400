//! In-memory backend for tests.

use crate::{SecureStorage, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A [`SecureStorage`] kept in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    service_name: String,
    data: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
    fail_writes: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_service(crate::SERVICE_NAME)
    }

    pub fn with_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Default::default()
        }
    }

    /// Number of successful `set` calls so far.
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }

    /// Make every following `set` fail the way a locked keychain does.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Raw stored value, bypassing any record decoding.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }
}

impl SecureStorage for MemoryStorage {
    fn service(&self) -> &str {
        &self.service_name
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if *self.fail_writes.lock() {
            return Err(StorageError::Platform("keychain is locked".to_string()));
        }
        self.data.lock().insert(key.to_string(), value.to_string());
        *self.writes.lock() += 1;
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }
}
