use crate::{CommandContext, Provider, ProviderEnv, ProviderError, ProviderFactory, ProviderResult, SamlApplication, SamlResolver};
use crate::output::OutputFormat;
use async_trait::async_trait;
use clap::{ArgMatches, Command};
use saml_assertion::SamlAssertion;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registered providers, in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build providers from `factories`. A factory that fails is logged and
    /// skipped so the remaining providers still load.
    pub fn load(env: &ProviderEnv, factories: &[(&str, ProviderFactory)]) -> Self {
        let mut registry = Self::new();
        for (name, factory) in factories {
            match factory(env) {
                Ok(provider) => registry.register(provider),
                Err(e) => warn!(provider = %name, error = %e, "Failed to load provider"),
            }
        }
        info!(providers = ?registry.names(), "Providers loaded");
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        debug!(provider = %provider.name(), "Registering provider");
        self.providers.push(provider);
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Applications from every provider, sorted by name. A failing provider
    /// is logged and contributes nothing.
    pub async fn list_apps(&self) -> Vec<SamlApplication> {
        let mut apps = Vec::new();
        for provider in &self.providers {
            match provider.list_apps().await {
                Ok(found) => {
                    debug!(provider = %provider.name(), count = found.len(), "Listed apps");
                    apps.extend(found);
                }
                Err(e) => {
                    warn!(provider = %provider.name(), error = %e, "Listing apps failed");
                }
            }
        }
        apps.sort();
        apps
    }

    /// Ask providers in order; the first that claims `url` answers it.
    pub async fn saml_request(&self, url: &str) -> ProviderResult<SamlAssertion> {
        for provider in &self.providers {
            if let Some(assertion) = provider.saml_request(url).await? {
                debug!(provider = %provider.name(), url = %url, "SAML request handled");
                return Ok(assertion);
            }
        }
        Err(ProviderError::UnhandledUrl(url.to_string()))
    }

    pub fn extend_cli(&self, command: Command) -> Command {
        self.providers
            .iter()
            .fold(command, |command, provider| provider.extend_cli(command))
    }

    /// Run a provider subcommand. `None` if no provider owns `name`.
    pub async fn run_command(
        &self,
        name: &str,
        matches: &ArgMatches,
        format: OutputFormat,
    ) -> Option<ProviderResult<()>> {
        let ctx = CommandContext {
            resolver: self,
            format,
        };
        for provider in &self.providers {
            if let Some(result) = provider.run_command(name, matches, &ctx).await {
                return Some(result);
            }
        }
        None
    }
}

#[async_trait]
impl SamlResolver for ProviderRegistry {
    async fn resolve_saml(&self, url: &str) -> ProviderResult<SamlAssertion> {
        self.saml_request(url).await
    }
}
