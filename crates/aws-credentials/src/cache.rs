//! The `aws` record: SSO client registration, per-start-URL device
//! authorizations and named role credentials.
//!
//! ```json
//! {
//!   "sso": {
//!     "registration": {...},
//!     "authorization": { "<start url>": {...} }
//!   },
//!   "credentials": { "<name>": {...} }
//! }
//! ```

use crate::{AwsError, AwsResult, RoleCredentials, SsoAuthorization, SsoRegistration};
use broker_storage::{KeyedRecord, SecureStorage, StorageResult};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, warn};

pub const AWS_RECORD: &str = "aws";

const SSO: &str = "sso";
const REGISTRATION: &str = "registration";
const AUTHORIZATION: &str = "authorization";
const CREDENTIALS: &str = "credentials";

/// Shared view of the `aws` record. Every cached entity reads and writes
/// its slot through here; writes are saved immediately.
#[derive(Debug)]
pub struct AwsCache {
    record: Mutex<KeyedRecord>,
}

impl AwsCache {
    pub fn open(storage: Arc<dyn SecureStorage>) -> AwsResult<Self> {
        Ok(Self {
            record: Mutex::new(KeyedRecord::open(storage, AWS_RECORD)?),
        })
    }

    pub fn registration_slot(&self) -> Option<Value> {
        let record = self.record.lock();
        record.get(SSO)?.get(REGISTRATION).cloned()
    }

    pub fn set_registration(&self, registration: &SsoRegistration) -> AwsResult<()> {
        let value = serde_json::to_value(registration).map_err(broker_storage::StorageError::from)?;
        let mut record = self.record.lock();
        record.object_mut(SSO).insert(REGISTRATION.to_string(), value);
        save(&mut record)
    }

    pub fn authorization_slot(&self, start_url: &str) -> Option<Value> {
        let record = self.record.lock();
        record.get(SSO)?.get(AUTHORIZATION)?.get(start_url).cloned()
    }

    pub fn set_authorization(&self, authorization: &SsoAuthorization) -> AwsResult<()> {
        let value = serde_json::to_value(authorization).map_err(broker_storage::StorageError::from)?;
        let mut record = self.record.lock();
        let sso = record.object_mut(SSO);
        let mut authorizations = match sso.remove(AUTHORIZATION) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        authorizations.insert(authorization.start_url.clone(), value);
        sso.insert(AUTHORIZATION.to_string(), Value::Object(authorizations));
        save(&mut record)
    }

    pub fn credentials_slot(&self, name: &str) -> Option<Value> {
        let record = self.record.lock();
        record.get(CREDENTIALS)?.get(name).cloned()
    }

    pub fn credentials(&self, name: &str) -> AwsResult<RoleCredentials> {
        let slot = self
            .credentials_slot(name)
            .ok_or_else(|| AwsError::NoSuchCredentials(name.to_string()))?;
        let mut credentials: RoleCredentials =
            serde_json::from_value(slot).map_err(broker_storage::StorageError::from)?;
        credentials.name = name.to_string();
        Ok(credentials)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.credentials_slot(name).is_some()
    }

    pub fn set_credentials(&self, credentials: &RoleCredentials) -> AwsResult<()> {
        let value = serde_json::to_value(credentials).map_err(broker_storage::StorageError::from)?;
        let mut record = self.record.lock();
        record
            .object_mut(CREDENTIALS)
            .insert(credentials.name.clone(), value);
        save(&mut record)
    }

    /// Every stored credential sorted by name. Entries that no longer
    /// decode are skipped.
    pub fn list(&self) -> Vec<RoleCredentials> {
        let record = self.record.lock();
        let Some(stored) = record.get(CREDENTIALS).and_then(Value::as_object) else {
            return Vec::new();
        };

        let mut list: Vec<RoleCredentials> = stored
            .iter()
            .filter_map(|(name, value)| match serde_json::from_value::<RoleCredentials>(value.clone()) {
                Ok(mut credentials) => {
                    credentials.name = name.clone();
                    Some(credentials)
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "Skipping undecodable credentials");
                    None
                }
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Rename `current` to `new`. An existing `new` is not overwritten.
    pub fn mv(&self, current: &str, new: &str) -> AwsResult<()> {
        if self.contains(new) {
            return Err(AwsError::CredentialsExist(new.to_string()));
        }
        let mut credentials = self.credentials(current)?;
        credentials.name = new.to_string();

        let value = serde_json::to_value(&credentials).map_err(broker_storage::StorageError::from)?;
        let mut record = self.record.lock();
        let stored = record.object_mut(CREDENTIALS);
        stored.remove(current);
        stored.insert(new.to_string(), value);
        save(&mut record)
    }

    pub fn rm(&self, name: &str) -> AwsResult<()> {
        let mut record = self.record.lock();
        record
            .object_mut(CREDENTIALS)
            .remove(name)
            .ok_or_else(|| AwsError::NoSuchCredentials(name.to_string()))?;
        save(&mut record)
    }

    /// Drop `name` from memory so a redefinition does not inherit its
    /// cached fields. Persisted on the next write.
    pub fn forget(&self, name: &str) {
        self.record.lock().object_mut(CREDENTIALS).remove(name);
    }

    /// Remove the whole record: credentials, registration and authorizations.
    pub fn delete_all(&self) -> StorageResult<()> {
        self.record.lock().delete_all()
    }
}

/// Persist `record`. A failed save reloads the stored document so the
/// in-memory view never holds writes the store does not.
fn save(record: &mut KeyedRecord) -> AwsResult<()> {
    let Err(e) = record.save() else {
        return Ok(());
    };
    error!(record = %record.name(), error = %e, "Saving record failed, reloading stored copy");
    if let Err(reload) = record.reload() {
        warn!(record = %record.name(), error = %reload, "Reloading record failed");
    }
    Err(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_storage::{MemoryStorage, StorageError};
    use serde_json::json;

    fn cache() -> (Arc<MemoryStorage>, AwsCache) {
        let storage = Arc::new(MemoryStorage::new());
        let cache = AwsCache::open(storage.clone()).unwrap();
        (storage, cache)
    }

    fn saml(name: &str) -> RoleCredentials {
        RoleCredentials::saml(name, "https://example.okta.com/app/aws/sso/saml").unwrap()
    }

    #[test]
    fn test_credentials_round_trip_through_storage() {
        let (storage, cache) = cache();
        let mut credentials = RoleCredentials::sso("dev", "https://example.awsapps.com/start#/", "123456789012", "Dev")
            .unwrap()
            .with_assume_role(Some("arn:aws:iam::210987654321:role/Chained"), Some("ext"));
        credentials.access_key_id = "ASIA".to_string();
        credentials.expiration_timestamp = 1_700_000_000.25;
        cache.set_credentials(&credentials).unwrap();

        let reopened = AwsCache::open(storage).unwrap();
        assert_eq!(reopened.credentials("dev").unwrap(), credentials);
    }

    #[test]
    fn test_failed_save_keeps_memory_in_step_with_store() {
        let (storage, cache) = cache();
        cache.set_credentials(&saml("prod")).unwrap();

        storage.fail_writes(true);
        assert!(matches!(
            cache.set_credentials(&saml("staging")),
            Err(AwsError::Storage(StorageError::Platform(_)))
        ));
        assert!(!cache.contains("staging"));
        assert!(cache.contains("prod"));

        let registration = SsoRegistration::default();
        assert!(cache.set_registration(&registration).is_err());
        assert!(cache.registration_slot().is_none());

        storage.fail_writes(false);
        cache.set_credentials(&saml("dev")).unwrap();
        let names: Vec<String> = AwsCache::open(storage).unwrap().list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["dev", "prod"]);
    }

    #[test]
    fn test_record_layout() {
        let (storage, cache) = cache();
        cache.set_credentials(&saml("prod")).unwrap();
        cache
            .set_registration(&SsoRegistration {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                expiration_timestamp: 1.0,
            })
            .unwrap();

        let raw: Value = serde_json::from_str(&storage.raw(AWS_RECORD).unwrap()).unwrap();
        assert_eq!(raw["credentials"]["prod"]["saml_url"], "https://example.okta.com/app/aws/sso/saml");
        assert!(raw["credentials"]["prod"].get("start_url").is_none());
        assert_eq!(raw["sso"]["registration"]["client_id"], "id");
    }

    #[test]
    fn test_authorizations_are_scoped_by_start_url() {
        let (_, cache) = cache();
        for (url, token) in [("https://a.awsapps.com/start#/", "a"), ("https://b.awsapps.com/start#/", "b")] {
            let mut authorization = SsoAuthorization::new(url).unwrap();
            authorization.access_token = token.to_string();
            cache.set_authorization(&authorization).unwrap();
        }

        assert_eq!(
            cache.authorization_slot("https://a.awsapps.com/start#/").unwrap()["access_token"],
            "a"
        );
        assert_eq!(
            cache.authorization_slot("https://b.awsapps.com/start#/").unwrap()["access_token"],
            "b"
        );
        assert!(cache.authorization_slot("https://c.awsapps.com/start#/").is_none());
    }

    #[test]
    fn test_list_is_sorted_and_skips_garbage() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                AWS_RECORD,
                &json!({"credentials": {
                    "zeta": {"name": "zeta", "saml_url": "https://z.example.com"},
                    "alpha": {"name": "alpha", "saml_url": "https://a.example.com"},
                    "broken": {"name": "broken"}
                }})
                .to_string(),
            )
            .unwrap();

        let cache = AwsCache::open(storage).unwrap();
        let names: Vec<_> = cache.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_mv_and_rm() {
        let (_, cache) = cache();
        cache.set_credentials(&saml("prod")).unwrap();
        cache.set_credentials(&saml("dev")).unwrap();

        assert!(matches!(cache.mv("prod", "dev"), Err(AwsError::CredentialsExist(_))));
        cache.mv("prod", "production").unwrap();
        assert_eq!(cache.credentials("production").unwrap().name, "production");
        assert!(matches!(cache.credentials("prod"), Err(AwsError::NoSuchCredentials(_))));

        cache.rm("dev").unwrap();
        assert!(matches!(cache.rm("dev"), Err(AwsError::NoSuchCredentials(_))));
        assert_eq!(cache.list().len(), 1);
    }

    #[test]
    fn test_delete_all() {
        let (storage, cache) = cache();
        cache.set_credentials(&saml("prod")).unwrap();
        cache.delete_all().unwrap();
        assert!(storage.raw(AWS_RECORD).is_none());
        assert!(cache.list().is_empty());
    }
}
