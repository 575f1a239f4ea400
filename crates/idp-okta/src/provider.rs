use crate::{OktaClient, OktaData, PROVIDER_NAME};
use async_trait::async_trait;
use broker_config_and_utils::url_has_domain;
use clap::{Arg, ArgAction, ArgMatches, Command};
use provider_hooks::output::{self, OutputFormat};
use provider_hooks::{
    select_factor, AuthnOutcome, CommandContext, Prompter, Provider, ProviderEnv, ProviderError, ProviderResult,
    SamlApplication,
};
use saml_assertion::SamlAssertion;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

const COMMAND: &str = "okta";

/// Okta as a provider plugin: lists app links, answers SAML requests for
/// the configured domain and adds the `okta` setup command.
pub struct OktaProvider {
    env: ProviderEnv,
}

impl OktaProvider {
    pub fn new(env: ProviderEnv) -> Self {
        Self { env }
    }

    pub fn factory(env: &ProviderEnv) -> ProviderResult<Arc<dyn Provider>> {
        Ok(Arc::new(Self::new(env.clone())))
    }

    fn data(&self) -> ProviderResult<OktaData> {
        Ok(OktaData::open(self.env.storage.clone())?)
    }

    fn client(&self, data: &OktaData) -> OktaClient {
        OktaClient::new(
            self.env.http.clone(),
            self.env.browser.clone(),
            data.domain(),
            data.username(),
            data.password(),
            data.session(),
        )
        .with_poll_interval(self.env.config.mfa_poll_interval())
    }

    /// Authenticate (reusing the stored session when it is still live),
    /// run the MFA prompt if needed and persist the resulting session.
    async fn authenticated_client(&self, data: &mut OktaData) -> ProviderResult<OktaClient> {
        let mut client = self.client(data);

        if let AuthnOutcome::MfaRequired(challenge) = client.authn(true).await? {
            let prompter = self.env.prompter.as_ref();
            let factor = select_factor(PROVIDER_NAME, &challenge.factors, prompter)?;
            let args = prompt_factor_args(&factor.factor_type, prompter)?;
            prompter.status("Waiting for MFA verification...");
            client.verify(&challenge, &factor.id, args).await?;
        }

        data.set_session(Some(client.session()))?;
        data.save()?;
        Ok(client)
    }

    fn configure(&self, matches: &ArgMatches, format: OutputFormat) -> ProviderResult<()> {
        let mut data = self.data()?;

        if matches.get_flag("rm") {
            data.delete_all()?;
            output::print_note("Okta configuration removed");
            return Ok(());
        }

        if matches.get_flag("rm-session") {
            data.set_session(None)?;
        }
        if let Some(domain) = matches.get_one::<String>("domain") {
            data.set_domain(domain);
        }
        if let Some(username) = matches.get_one::<String>("username") {
            data.set_username(username);
        }
        if matches.get_flag("password") {
            let password = self.env.prompter.secret("Okta password")?;
            data.set_password(&password);
        }
        data.save()?;

        match format {
            OutputFormat::Json => output::print_json(&data.masked()),
            OutputFormat::Text => output::print_record(&data.masked()),
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for OktaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn list_apps(&self) -> ProviderResult<Vec<SamlApplication>> {
        let mut data = self.data()?;
        if !data.is_configured() {
            debug!("Okta is not configured, no apps to list");
            return Ok(Vec::new());
        }
        let client = self.authenticated_client(&mut data).await?;
        client.app_links().await
    }

    async fn saml_request(&self, url: &str) -> ProviderResult<Option<SamlAssertion>> {
        let mut data = self.data()?;
        if !url_has_domain(url, data.domain()) {
            return Ok(None);
        }
        if !data.is_configured() {
            return Err(ProviderError::not_configured(PROVIDER_NAME, COMMAND));
        }

        info!(url, "Requesting SAML assertion from Okta");
        let client = self.authenticated_client(&mut data).await?;
        client.saml_request(url).await.map(Some)
    }

    fn extend_cli(&self, command: Command) -> Command {
        command.subcommand(
            Command::new(COMMAND)
                .about("Manage Okta configuration")
                .arg(Arg::new("domain").short('d').long("domain").help("Okta domain, e.g. example.okta.com"))
                .arg(Arg::new("username").short('u').long("username").help("Okta username"))
                .arg(
                    Arg::new("password")
                        .short('p')
                        .long("password")
                        .action(ArgAction::SetTrue)
                        .help("Prompt for the Okta password"),
                )
                .arg(
                    Arg::new("rm-session")
                        .long("rm-session")
                        .action(ArgAction::SetTrue)
                        .help("Forget the stored Okta session"),
                )
                .arg(
                    Arg::new("rm")
                        .long("rm")
                        .action(ArgAction::SetTrue)
                        .help("Remove all Okta configuration"),
                ),
        )
    }

    async fn run_command(
        &self,
        name: &str,
        matches: &ArgMatches,
        ctx: &CommandContext<'_>,
    ) -> Option<ProviderResult<()>> {
        (name == COMMAND).then(|| self.configure(matches, ctx.format))
    }
}

/// Ask for whatever `factor_type` needs in its verify request.
pub fn prompt_factor_args(factor_type: &str, prompter: &dyn Prompter) -> ProviderResult<Map<String, Value>> {
    let mut args = Map::new();
    match factor_type {
        "call" | "email" | "sms" | "token" | "token:hardware" | "token:hotp" | "token:software:totp" => {
            let passcode = prompter.text("Passcode")?;
            args.insert("passCode".to_string(), Value::String(passcode.trim().to_string()));
        }
        "question" => {
            let answer = prompter.secret("Answer")?;
            args.insert("answer".to_string(), Value::String(answer));
        }
        "push" | "web" => {}
        other => {
            return Err(ProviderError::UnknownFactor {
                provider: PROVIDER_NAME.to_string(),
                factor_type: other.to_string(),
            })
        }
    }
    Ok(args)
}
