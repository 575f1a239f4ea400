//! A JSON object persisted as a single secure-store entry.

use crate::{SecureStorage, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mapping of string keys to JSON values stored under `(service, name)`.
///
/// The record is read once when opened, mutated in memory and written back
/// only by [`KeyedRecord::save`], which replaces the whole stored document.
/// A stored document that fails to decode opens as an empty record: the
/// next save overwrites it. Platform errors (locked keychain, no D-Bus) are
/// still returned.
pub struct KeyedRecord {
    storage: Arc<dyn SecureStorage>,
    name: String,
    data: Map<String, Value>,
}

impl std::fmt::Debug for KeyedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRecord")
            .field("service", &self.storage.service())
            .field("name", &self.name)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl KeyedRecord {
    /// Open the record `name`, loading whatever is currently stored.
    pub fn open(storage: Arc<dyn SecureStorage>, name: &str) -> StorageResult<Self> {
        let mut record = Self::with_data(storage, name, Map::new());
        record.reload()?;
        Ok(record)
    }

    /// Create a record view with initial contents, without reading the store.
    pub fn with_data(storage: Arc<dyn SecureStorage>, name: &str, data: Map<String, Value>) -> Self {
        Self {
            storage,
            name: name.to_string(),
            data,
        }
    }

    /// Discard in-memory changes and read the stored document again.
    pub fn reload(&mut self) -> StorageResult<()> {
        self.data = match self.storage.get(&self.name)? {
            None => Map::new(),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    warn!(
                        service = %self.storage.service(),
                        record = %self.name,
                        kind = json_kind(&other),
                        "Stored record is not a JSON object, treating as empty"
                    );
                    Map::new()
                }
                Err(e) => {
                    warn!(
                        service = %self.storage.service(),
                        record = %self.name,
                        error = %e,
                        "Stored record could not be decoded, treating as empty"
                    );
                    Map::new()
                }
            },
        };

        debug!(
            service = %self.storage.service(),
            record = %self.name,
            keys = ?self.data.keys().collect::<Vec<_>>(),
            "Loaded record"
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Deserialize the value at `key`. Missing or mistyped values are `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn set_serialized<T: Serialize>(&mut self, key: &str, value: &T) -> StorageResult<()> {
        self.data.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Nested object at `key`, created (or replaced if not an object) on demand.
    pub fn object_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        slot.as_object_mut().expect("slot holds an object")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the whole in-memory document to the store.
    pub fn save(&self) -> StorageResult<()> {
        debug!(
            service = %self.storage.service(),
            record = %self.name,
            keys = ?self.data.keys().collect::<Vec<_>>(),
            "Saving record"
        );
        let encoded = serde_json::to_string(&self.data)?;
        self.storage.set(&self.name, &encoded)
    }

    /// Remove the stored document and clear the in-memory view.
    /// Deleting a record that was never saved is not an error.
    pub fn delete_all(&mut self) -> StorageResult<()> {
        debug!(service = %self.storage.service(), record = %self.name, "Deleting record");
        self.data.clear();
        self.storage.delete(&self.name)?;
        Ok(())
    }

    /// Shallow copy for display, with the listed keys masked.
    pub fn masked(&self, masked_keys: &[&str]) -> Map<String, Value> {
        self.data
            .iter()
            .map(|(key, value)| {
                let value = if masked_keys.contains(&key.as_str()) {
                    Value::String("<masked>".to_string())
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use serde_json::json;

    fn storage() -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn test_open_missing_record_is_empty() {
        let record = KeyedRecord::open(storage(), "okta").unwrap();
        assert!(record.is_empty());
        assert_eq!(record.name(), "okta");
    }

    #[test]
    fn test_changes_persist_only_on_save() {
        let storage = storage();
        let mut record = KeyedRecord::open(storage.clone(), "okta").unwrap();
        record.set("domain", "example.okta.com");

        let reopened = KeyedRecord::open(storage.clone(), "okta").unwrap();
        assert!(reopened.get("domain").is_none());

        record.save().unwrap();
        let reopened = KeyedRecord::open(storage, "okta").unwrap();
        assert_eq!(reopened.get_str("domain"), Some("example.okta.com"));
    }

    #[test]
    fn test_save_replaces_whole_document() {
        let storage = storage();
        let mut record = KeyedRecord::open(storage.clone(), "alias").unwrap();
        record.set("a", "https://a.example.com");
        record.set("b", "https://b.example.com");
        record.save().unwrap();

        record.remove("a");
        record.save().unwrap();

        let raw: Value = serde_json::from_str(&storage.raw("alias").unwrap()).unwrap();
        assert_eq!(raw, json!({"b": "https://b.example.com"}));
    }

    #[test]
    fn test_corrupt_record_opens_empty() {
        let storage = storage();
        storage.set("aws", "{not json").unwrap();

        let mut record = KeyedRecord::open(storage.clone(), "aws").unwrap();
        assert!(record.is_empty());

        record.set("credentials", json!({}));
        record.save().unwrap();
        assert_eq!(storage.raw("aws").unwrap(), r#"{"credentials":{}}"#);
    }

    #[test]
    fn test_non_object_record_opens_empty() {
        let storage = storage();
        storage.set("aws", "[1, 2, 3]").unwrap();
        assert!(KeyedRecord::open(storage, "aws").unwrap().is_empty());
    }

    #[test]
    fn test_delete_all_tolerates_absent_entry() {
        let storage = storage();
        let mut record = KeyedRecord::open(storage.clone(), "jumpcloud").unwrap();
        record.delete_all().unwrap();

        record.set("email", "user@example.com");
        record.save().unwrap();
        record.delete_all().unwrap();
        assert!(record.is_empty());
        assert!(storage.raw("jumpcloud").is_none());
    }

    #[test]
    fn test_object_mut_creates_nested_objects() {
        let mut record = KeyedRecord::open(storage(), "aws").unwrap();
        record.set("sso", "garbage");
        record
            .object_mut("sso")
            .insert("registration".to_string(), json!({"client_id": "abc"}));
        assert_eq!(record.get("sso"), Some(&json!({"registration": {"client_id": "abc"}})));
    }

    #[test]
    fn test_typed_access() {
        #[derive(Debug, PartialEq, serde::Deserialize, serde::Serialize)]
        struct Session {
            id: String,
        }

        let mut record = KeyedRecord::open(storage(), "okta").unwrap();
        record
            .set_serialized("session", &Session { id: "s1".to_string() })
            .unwrap();
        record.set("count", 3);

        assert_eq!(record.get_as::<Session>("session"), Some(Session { id: "s1".to_string() }));
        assert_eq!(record.get_as::<Session>("count"), None);
        assert_eq!(record.get_as::<Session>("missing"), None);
    }

    #[test]
    fn test_masked_view() {
        let mut record = KeyedRecord::open(storage(), "okta").unwrap();
        record.set("username", "user");
        record.set("password", "hunter2");

        let masked = record.masked(&["password", "session"]);
        assert_eq!(masked["username"], "user");
        assert_eq!(masked["password"], "<masked>");
        assert!(!masked.contains_key("session"));
    }
}
