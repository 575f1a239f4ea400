//! Expiry bookkeeping for entities cached inside records.

use crate::StorageResult;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Current time as fractional Unix seconds.
pub fn now_timestamp() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// An entity with an absolute expiry that is cached in a [`crate::KeyedRecord`].
///
/// `expiration_timestamp` is fractional Unix seconds; `0.0` means the entity
/// was never issued and is therefore always expired.
pub trait Cacheable: Serialize + DeserializeOwned {
    fn expiration_timestamp(&self) -> f64;

    /// Seconds left before expiry; negative once expired.
    fn ttl(&self) -> f64 {
        self.expiration_timestamp() - now_timestamp()
    }

    fn is_expired(&self) -> bool {
        self.ttl() < 0.0
    }

    /// Whether a renewal has to talk to the provider.
    fn needs_renewal(&self, force: bool) -> bool {
        force || self.is_expired()
    }

    fn ttl_display(&self) -> String {
        format_ttl(self.ttl())
    }

    /// Fill fields that are unset (null, "", 0, false, empty) from a cached
    /// copy. Fields the caller already set win over cached ones.
    fn hydrate_from(&mut self, cached: &Value) -> StorageResult<()>
    where
        Self: Sized,
    {
        let Some(cached) = cached.as_object() else {
            return Ok(());
        };

        let mut current = serde_json::to_value(&*self)?;
        if let Some(fields) = current.as_object_mut() {
            for (key, value) in cached {
                if fields.get(key).map_or(true, is_unset) {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }

        *self = serde_json::from_value(current)?;
        Ok(())
    }
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Render a TTL as `H:MM:SS`, with a day count when needed and a leading
/// `-` once expired.
pub fn format_ttl(ttl_secs: f64) -> String {
    let sign = if ttl_secs < 0.0 { "-" } else { "" };
    let total = ttl_secs.abs().floor() as u64;
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rem / 3_600, (rem % 3_600) / 60, rem % 60);

    match days {
        0 => format!("{sign}{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("{sign}1 day, {hours}:{minutes:02}:{seconds:02}"),
        d => format!("{sign}{d} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

/// Identity-defining fields were empty when an entity was constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required fields for {entity}: {}", .fields.join(", "))]
pub struct MissingFields {
    pub entity: String,
    pub fields: Vec<String>,
}

/// Fail unless every `(name, value)` pair has a non-empty value.
pub fn require_fields(entity: &str, fields: &[(&str, &str)]) -> Result<(), MissingFields> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingFields {
            entity: entity.to_string(),
            fields: missing,
        })
    }
}
