use crate::{Prompter, ProviderError, ProviderResult};
use serde_json::Value;

/// An MFA factor offered by an identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub id: String,
    /// Provider-defined type, e.g. `push`, `token:software:totp`, `duo`.
    pub factor_type: String,
    /// Vendor behind the factor (`OKTA`, `GOOGLE`, `DUO`); may be empty.
    pub provider: String,
    /// Human-readable details, such as a phone number or device name.
    pub profile: Value,
}

impl Factor {
    pub fn new(id: &str, factor_type: &str) -> Self {
        Self {
            id: id.to_string(),
            factor_type: factor_type.to_string(),
            provider: String::new(),
            profile: Value::Null,
        }
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }

    pub fn with_profile(mut self, profile: Value) -> Self {
        self.profile = profile;
        self
    }

    /// Profile rendered as `key: value` pairs.
    pub fn profile_summary(&self) -> String {
        match &self.profile {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| match value {
                    Value::String(s) => format!("{}: {}", key, s),
                    other => format!("{}: {}", key, other),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Pick the factor to verify. A single offered factor is used without
/// asking; otherwise the user picks one by zero-based index.
pub fn select_factor<'a>(
    provider: &str,
    factors: &'a [Factor],
    prompter: &dyn Prompter,
) -> ProviderResult<&'a Factor> {
    match factors {
        [] => Err(ProviderError::mfa(provider, "no usable factors offered")),
        [only] => Ok(only),
        _ => {
            let rows: Vec<Vec<String>> = factors
                .iter()
                .map(|f| vec![f.factor_type.clone(), f.provider.clone(), f.profile_summary()])
                .collect();
            let choice = prompter.choose(
                &format!("{} MFA choice", provider),
                &["Type", "Provider", "Profile"],
                &rows,
            )?;
            factors.get(choice).ok_or(ProviderError::InvalidChoice {
                choice,
                max: factors.len() - 1,
            })
        }
    }
}
