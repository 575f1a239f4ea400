use crate::{ProviderError, ProviderResult};
use broker_config_and_utils::is_url;
use broker_storage::{KeyedRecord, SecureStorage};
use std::sync::Arc;

pub const ALIAS_RECORD: &str = "alias";

/// Short names for SSO application URLs, persisted in the `alias` record.
#[derive(Debug)]
pub struct Aliases {
    record: KeyedRecord,
}

impl Aliases {
    pub fn open(storage: Arc<dyn SecureStorage>) -> ProviderResult<Self> {
        Ok(Self {
            record: KeyedRecord::open(storage, ALIAS_RECORD)?,
        })
    }

    pub fn add(&mut self, name: &str, url: &str) -> ProviderResult<()> {
        if !is_url(url) {
            return Err(ProviderError::InvalidUrl(url.to_string()));
        }
        self.record.set(name, url);
        self.record.save()?;
        Ok(())
    }

    /// URLs pass through unchanged; anything else must be a known alias.
    pub fn resolve(&self, name_or_url: &str) -> ProviderResult<String> {
        if is_url(name_or_url) {
            return Ok(name_or_url.to_string());
        }
        self.record
            .get_str(name_or_url)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::NoSuchAlias(name_or_url.to_string()))
    }

    /// Sorted names pointing at `url`.
    pub fn aliases_for(&self, url: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .record
            .iter()
            .filter(|(_, value)| value.as_str() == Some(url))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn mv(&mut self, current: &str, new: &str) -> ProviderResult<()> {
        let url = self
            .record
            .remove(current)
            .ok_or_else(|| ProviderError::NoSuchAlias(current.to_string()))?;
        self.record.set(new, url);
        self.record.save()?;
        Ok(())
    }

    pub fn rm(&mut self, name: &str) -> ProviderResult<()> {
        self.record
            .remove(name)
            .ok_or_else(|| ProviderError::NoSuchAlias(name.to_string()))?;
        self.record.save()?;
        Ok(())
    }

    pub fn clear(&mut self) -> ProviderResult<()> {
        self.record.delete_all()?;
        Ok(())
    }

    /// `(name, url)` pairs sorted by name.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .record
            .iter()
            .filter_map(|(name, value)| value.as_str().map(|url| (name.clone(), url.to_string())))
            .collect();
        entries.sort();
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}
