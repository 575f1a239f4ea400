//! Built-in commands: application listing and URL aliases.

use clap::Subcommand;
use provider_hooks::output::{self, OutputFormat};
use provider_hooks::{Aliases, ProviderEnv, ProviderRegistry};
use serde_json::{json, Value};

#[derive(Subcommand, Debug)]
pub enum Builtin {
    /// List SSO applications from every configured identity provider
    Apps,
    /// Manage short names for SSO application URLs
    Alias {
        #[command(subcommand)]
        action: AliasAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum AliasAction {
    /// Add or replace an alias
    Add { name: String, url: String },
    /// List aliases
    Ls,
    /// Rename an alias
    Mv { current_name: String, new_name: String },
    /// Remove an alias
    Rm {
        name: Option<String>,
        /// Remove all aliases
        #[arg(short, long)]
        all: bool,
    },
}

pub async fn run(
    builtin: Builtin,
    env: &ProviderEnv,
    registry: &ProviderRegistry,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut aliases = Aliases::open(env.storage.clone())?;

    match builtin {
        Builtin::Apps => {
            let apps = registry.list_apps().await;
            match format {
                OutputFormat::Json => {
                    let listed: Vec<Value> = apps
                        .iter()
                        .map(|app| json!({"name": app.name, "url": app.url, "aliases": aliases.aliases_for(&app.url)}))
                        .collect();
                    output::print_json(&listed);
                }
                OutputFormat::Text if apps.is_empty() => output::print_note("No applications"),
                OutputFormat::Text => {
                    let rows: Vec<Vec<String>> = apps
                        .iter()
                        .map(|app| vec![app.name.clone(), app.url.clone(), aliases.aliases_for(&app.url).join(", ")])
                        .collect();
                    output::print_table(&["Name", "URL", "Aliases"], &rows);
                }
            }
            Ok(())
        }
        Builtin::Alias { action } => {
            match action {
                AliasAction::Add { name, url } => aliases.add(&name, &url)?,
                AliasAction::Ls => {}
                AliasAction::Mv { current_name, new_name } => aliases.mv(&current_name, &new_name)?,
                AliasAction::Rm { all: true, .. } => aliases.clear()?,
                AliasAction::Rm { name: Some(name), .. } => aliases.rm(&name)?,
                AliasAction::Rm { name: None, .. } => anyhow::bail!("Give an alias name or --all"),
            }
            print_aliases(&aliases, format);
            Ok(())
        }
    }
}

fn print_aliases(aliases: &Aliases, format: OutputFormat) {
    let entries = aliases.list();
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, Value> = entries
                .into_iter()
                .map(|(name, url)| (name, Value::String(url)))
                .collect();
            output::print_json(&map);
        }
        OutputFormat::Text if entries.is_empty() => output::print_note("No aliases"),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = entries.into_iter().map(|(name, url)| vec![name, url]).collect();
            output::print_table(&["Alias", "URL"], &rows);
        }
    }
}
