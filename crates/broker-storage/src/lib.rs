//! Keychain-backed persistence for credbroker.
//!
//! Every piece of durable state (provider configuration and sessions,
//! aliases, cached cloud credentials) is one JSON document stored as a single
//! secret in the platform credential store:
//! - **macOS**: Keychain Access via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Windows**: Credential Vault via `windows` crate
//!
//! [`KeyedRecord`] is the mapping view over one such document and
//! [`Cacheable`] adds expiry bookkeeping for entities cached inside records.

mod cacheable;
mod record;
mod traits;

#[cfg(any(test, feature = "test-util"))]
mod memory;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

pub use cacheable::{format_ttl, now_timestamp, require_fields, Cacheable, MissingFields};
pub use record::KeyedRecord;
pub use traits::SecureStorage;

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStorage;

use std::sync::Arc;
use thiserror::Error;

/// Keychain service under which every record is stored.
pub const SERVICE_NAME: &str = "credbroker";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Platform storage error: {0}")]
    Platform(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    MissingFields(#[from] MissingFields),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Create the platform secure storage for `service_name`.
pub fn create_storage(service_name: &str) -> StorageResult<Arc<dyn SecureStorage>> {
    #[cfg(target_os = "macos")]
    {
        let storage = macos::KeychainStorage::new(service_name)?;
        Ok(Arc::new(storage))
    }

    #[cfg(target_os = "linux")]
    {
        let storage = linux::SecretServiceStorage::new(service_name)?;
        Ok(Arc::new(storage))
    }

    #[cfg(target_os = "windows")]
    {
        let storage = windows::CredentialStorage::new(service_name)?;
        Ok(Arc::new(storage))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(StorageError::Platform(format!(
            "No secure storage implementation available for this platform (service: {})",
            service_name
        )))
    }
}
