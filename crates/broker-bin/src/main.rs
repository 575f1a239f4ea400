//! credbroker - local credential broker.

mod commands;
mod prompt;

use anyhow::Context;
use aws_credentials::AwsProvider;
use broker_config_and_utils::{init_logging, Config, Paths, APP_NAME};
use broker_http::HttpClient;
use broker_storage::{create_storage, SERVICE_NAME};
use callback_relay::SystemBrowser;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::Builtin;
use idp_jumpcloud::JumpCloudProvider;
use idp_okta::OktaProvider;
use prompt::TerminalPrompter;
use provider_hooks::output::OutputFormat;
use provider_hooks::{ProviderEnv, ProviderError, ProviderFactory, ProviderRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

/// Built-in providers, in the order they are asked to answer SAML URLs.
const PROVIDERS: &[(&str, ProviderFactory)] = &[
    ("okta", OktaProvider::factory),
    ("jumpcloud", JumpCloudProvider::factory),
    ("aws", AwsProvider::factory),
];

/// Local credential broker for identity providers and cloud credentials.
#[derive(Parser, Debug, Default)]
#[command(name = "credbroker")]
#[command(version)]
struct Cli {
    /// Print debug logs on stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Base directory for config and logs. Defaults to ~/.credbroker
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

impl Cli {
    /// Global options given before the subcommand. Logging has to be up
    /// before providers load, and the full command tree needs the providers.
    fn early() -> Self {
        Self::command()
            .ignore_errors(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .allow_external_subcommands(true)
            .try_get_matches()
            .ok()
            .and_then(|matches| Self::from_arg_matches(&matches).ok())
            .unwrap_or_default()
    }
}

/// Root command with the built-in commands and every provider's commands.
fn build_command(registry: &ProviderRegistry) -> clap::Command {
    let command = Builtin::augment_subcommands(Cli::command())
        .subcommand_required(true)
        .arg_required_else_help(true);
    registry.extend_cli(command)
}

async fn dispatch(
    matches: &ArgMatches,
    env: &ProviderEnv,
    registry: &ProviderRegistry,
) -> anyhow::Result<()> {
    let cli = Cli::from_arg_matches(matches)?;
    let Some((name, sub)) = matches.subcommand() else {
        return Ok(());
    };

    if Builtin::has_subcommand(name) {
        let builtin = Builtin::from_arg_matches(matches)?;
        return commands::run(builtin, env, registry, cli.format).await;
    }

    debug!(command = name, "Dispatching provider command");
    match registry.run_command(name, sub, cli.format).await {
        Some(result) => Ok(result?),
        None => anyhow::bail!("Unknown command: {}", name),
    }
}

async fn run() -> anyhow::Result<()> {
    let early = Cli::early();
    let paths = match &early.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths).context("Failed to load configuration")?;

    let level = early.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, early.debug, Some(&paths));

    let env = ProviderEnv {
        config,
        storage: create_storage(SERVICE_NAME).context("Failed to open the credential store")?,
        http: HttpClient::with_reqwest()?,
        prompter: Arc::new(TerminalPrompter),
        browser: Arc::new(SystemBrowser),
    };
    let registry = ProviderRegistry::load(&env, PROVIDERS);

    let matches = build_command(&registry).get_matches();
    dispatch(&matches, &env, &registry).await
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ProviderError>() {
            Some(ProviderError::Exit(code)) => ExitCode::from(u8::try_from(*code).unwrap_or(1)),
            _ => {
                eprintln!("{}: error: {:#}", APP_NAME, e);
                ExitCode::FAILURE
            }
        },
    }
}
