//! macOS Keychain backend.

use crate::{SecureStorage, StorageError, StorageResult};
use security_framework::item::{ItemClass, ItemSearchOptions, Limit, SearchResult};
use security_framework::passwords::{delete_generic_password, set_generic_password};
use tracing::debug;

/// errSecItemNotFound
const ERR_ITEM_NOT_FOUND: &str = "-25300";

pub struct KeychainStorage {
    service_name: String,
}

impl KeychainStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn is_not_found(message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("not found")
            || message.contains("could not be found")
            || message.contains(ERR_ITEM_NOT_FOUND)
            || message.contains("errsecitemnotfound")
    }
}

impl SecureStorage for KeychainStorage {
    fn service(&self) -> &str {
        &self.service_name
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, bytes = value.len(), "Writing keychain item");

        // Updates the existing item in place when present.
        set_generic_password(&self.service_name, key, value.as_bytes())
            .map_err(|e| StorageError::Platform(format!("Failed to set keychain item: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "Reading keychain item");

        let mut search = ItemSearchOptions::new();
        search
            .class(ItemClass::generic_password())
            .service(&self.service_name)
            .account(key)
            .limit(Limit::Max(1))
            .load_data(true);

        let results = match search.search() {
            Ok(results) => results,
            Err(e) if Self::is_not_found(&e.to_string()) => return Ok(None),
            Err(e) => {
                return Err(StorageError::Platform(format!(
                    "Failed to get keychain item: {}",
                    e
                )))
            }
        };

        match results.into_iter().next() {
            Some(SearchResult::Data(data)) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            _ => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");

        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) if Self::is_not_found(&e.to_string()) => Ok(false),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to delete keychain item: {}",
                e
            ))),
        }
    }
}
