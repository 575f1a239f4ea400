use crate::JumpCloudSession;
use broker_storage::{KeyedRecord, SecureStorage, StorageResult};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const JUMPCLOUD_RECORD: &str = "jumpcloud";

/// JumpCloud credentials and console session, persisted in the
/// `jumpcloud` record.
#[derive(Debug)]
pub struct JumpCloudData {
    record: KeyedRecord,
}

impl JumpCloudData {
    pub fn open(storage: Arc<dyn SecureStorage>) -> StorageResult<Self> {
        Ok(Self {
            record: KeyedRecord::open(storage, JUMPCLOUD_RECORD)?,
        })
    }

    pub fn email(&self) -> &str {
        self.record.get_str("email").unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.record.get_str("password").unwrap_or_default()
    }

    pub fn session(&self) -> JumpCloudSession {
        self.record.get_as("session").unwrap_or_default()
    }

    pub fn is_configured(&self) -> bool {
        !self.email().is_empty() && !self.password().is_empty()
    }

    pub fn set_email(&mut self, email: &str) {
        self.record.set("email", email);
    }

    pub fn set_password(&mut self, password: &str) {
        self.record.set("password", password);
    }

    pub fn set_session(&mut self, session: Option<&JumpCloudSession>) -> StorageResult<()> {
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

    pub fn masked(&self) -> Map<String, Value> {
        self.record.masked(&["password", "session"])
    }
}
