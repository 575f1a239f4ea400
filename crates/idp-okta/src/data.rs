use crate::OktaSession;
use broker_storage::{KeyedRecord, SecureStorage, StorageResult};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const OKTA_RECORD: &str = "okta";

/// Okta settings and session, persisted in the `okta` record.
#[derive(Debug)]
pub struct OktaData {
    record: KeyedRecord,
}

impl OktaData {
    pub fn open(storage: Arc<dyn SecureStorage>) -> StorageResult<Self> {
        Ok(Self {
            record: KeyedRecord::open(storage, OKTA_RECORD)?,
        })
    }

    pub fn domain(&self) -> &str {
        self.record.get_str("domain").unwrap_or_default()
    }

    pub fn username(&self) -> &str {
        self.record.get_str("username").unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.record.get_str("password").unwrap_or_default()
    }

    pub fn session(&self) -> OktaSession {
        self.record.get_as("session").unwrap_or_default()
    }

    /// Domain, username and password are all set.
    pub fn is_configured(&self) -> bool {
        !self.domain().is_empty() && !self.username().is_empty() && !self.password().is_empty()
    }

    pub fn set_domain(&mut self, domain: &str) {
        self.record.set("domain", domain);
    }

    pub fn set_username(&mut self, username: &str) {
        self.record.set("username", username);
    }

    pub fn set_password(&mut self, password: &str) {
        self.record.set("password", password);
    }

    /// Replace the stored session; `None` removes it.
    pub fn set_session(&mut self, session: Option<&OktaSession>) -> StorageResult<()> {
        match session {
            Some(session) => self.record.set_serialized("session", session),
            None => {
                self.record.remove("session");
                Ok(())
            }
        }
    }

    pub fn save(&self) -> StorageResult<()> {
        self.record.save()
    }

    pub fn delete_all(&mut self) -> StorageResult<()> {
        self.record.delete_all()
    }

    /// Contents for display with the password and session hidden.
    pub fn masked(&self) -> Map<String, Value> {
        self.record.masked(&["password", "session"])
    }
}
