use crate::output::OutputFormat;
use crate::{Prompter, ProviderResult};
use async_trait::async_trait;
use broker_config_and_utils::Config;
use broker_http::HttpClient;
use broker_storage::SecureStorage;
use callback_relay::BrowserOpener;
use clap::{ArgMatches, Command};
use saml_assertion::SamlAssertion;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// An application reachable through an identity provider's SSO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SamlApplication {
    pub name: String,
    pub url: String,
}

impl SamlApplication {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

// Applications list in case-insensitive name order.
impl Ord for SamlApplication {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.url.cmp(&other.url))
    }
}

impl PartialOrd for SamlApplication {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Turns an SSO application URL into a SAML assertion.
#[async_trait]
pub trait SamlResolver: Send + Sync {
    async fn resolve_saml(&self, url: &str) -> ProviderResult<SamlAssertion>;
}

/// What provider commands get from the host besides their own state.
pub struct CommandContext<'a> {
    pub resolver: &'a dyn SamlResolver,
    pub format: OutputFormat,
}

/// A provider plugin.
///
/// Every hook has a default, so a provider implements only the
/// capabilities it has: identity providers list apps and answer SAML URLs,
/// credential providers only add commands.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Applications the user can reach. Unconfigured providers return an
    /// empty list.
    async fn list_apps(&self) -> ProviderResult<Vec<SamlApplication>> {
        Ok(Vec::new())
    }

    /// `Ok(None)` when the URL is not this provider's to answer.
    async fn saml_request(&self, _url: &str) -> ProviderResult<Option<SamlAssertion>> {
        Ok(None)
    }

    /// Add this provider's subcommands to the root command.
    fn extend_cli(&self, command: Command) -> Command {
        command
    }

    /// Run subcommand `name` if it belongs to this provider.
    async fn run_command(
        &self,
        _name: &str,
        _matches: &ArgMatches,
        _ctx: &CommandContext<'_>,
    ) -> Option<ProviderResult<()>> {
        None
    }
}

/// Shared capabilities handed to every provider at construction.
#[derive(Clone)]
pub struct ProviderEnv {
    pub config: Config,
    pub storage: Arc<dyn SecureStorage>,
    pub http: HttpClient,
    pub prompter: Arc<dyn Prompter>,
    pub browser: Arc<dyn BrowserOpener>,
}

/// Builds a provider from the shared environment.
pub type ProviderFactory = fn(&ProviderEnv) -> ProviderResult<Arc<dyn Provider>>;
