//! Runtime configuration.

use crate::{CoreResult, Paths, APP_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Region hosting the IAM Identity Center OIDC and portal endpoints.
pub const DEFAULT_SSO_REGION: &str = "us-east-1";

/// CLI configuration, read from `~/.credbroker/config.json`.
///
/// Every field has a default, so a partial or missing file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Region for SSO OIDC/portal calls.
    pub sso_region: String,
    /// Client name sent when registering the SSO OIDC client.
    pub sso_client_name: String,
    /// Sleep between MFA verification polls while a push is pending.
    pub mfa_poll_interval_ms: u64,
    /// Overall deadline for the device authorization poll loop. 0 disables.
    pub device_auth_timeout_secs: u64,
    /// How long the callback relay waits for the frame to post back. 0 disables.
    pub relay_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            sso_region: DEFAULT_SSO_REGION.to_string(),
            sso_client_name: APP_NAME.to_string(),
            mfa_poll_interval_ms: 2_000,
            device_auth_timeout_secs: 600,
            relay_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from the environment. `lookup` is injected so tests
    /// don't have to mutate the process environment.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = non_empty("CREDBROKER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(region) = non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION")) {
            self.sso_region = region;
        }
    }

    pub fn mfa_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mfa_poll_interval_ms)
    }

    pub fn device_auth_timeout(&self) -> Option<Duration> {
        (self.device_auth_timeout_secs > 0).then(|| Duration::from_secs(self.device_auth_timeout_secs))
    }

    pub fn relay_timeout(&self) -> Option<Duration> {
        (self.relay_timeout_secs > 0).then(|| Duration::from_secs(self.relay_timeout_secs))
    }
}
