use crate::{JumpCloudClient, JumpCloudData, PROVIDER_NAME, SSO_DOMAIN};
use async_trait::async_trait;
use broker_config_and_utils::url_has_domain;
use clap::{Arg, ArgAction, ArgMatches, Command};
use provider_hooks::output::{self, OutputFormat};
use provider_hooks::{
    select_factor, AuthnOutcome, CommandContext, Prompter, Provider, ProviderEnv, ProviderError, ProviderResult,
    SamlApplication,
};
use saml_assertion::SamlAssertion;
use std::sync::Arc;
use tracing::{debug, info};

const COMMAND: &str = "jumpcloud";

pub struct JumpCloudProvider {
    env: ProviderEnv,
}

impl JumpCloudProvider {
    pub fn new(env: ProviderEnv) -> Self {
        Self { env }
    }

    pub fn factory(env: &ProviderEnv) -> ProviderResult<Arc<dyn Provider>> {
        Ok(Arc::new(Self::new(env.clone())))
    }

    fn data(&self) -> ProviderResult<JumpCloudData> {
        Ok(JumpCloudData::open(self.env.storage.clone())?)
    }

    async fn authenticated_client(&self, data: &mut JumpCloudData) -> ProviderResult<JumpCloudClient> {
        let mut client = JumpCloudClient::new(
            self.env.http.clone(),
            self.env.browser.clone(),
            data.email(),
            data.password(),
            data.session(),
        )
        .with_relay_timeout(self.env.config.relay_timeout());

        if let AuthnOutcome::MfaRequired(challenge) = client.auth(true).await? {
            let prompter = self.env.prompter.as_ref();
            let factor = select_factor(PROVIDER_NAME, &challenge.factors, prompter)?;
            let otp = prompt_factor_args(&factor.factor_type, prompter)?;
            prompter.status("Waiting for MFA verification...");
            client.verify(&factor.factor_type, otp.as_deref()).await?;
        }

        data.set_session(Some(client.session()))?;
        data.save()?;
        Ok(client)
    }

    fn configure(&self, matches: &ArgMatches, format: OutputFormat) -> ProviderResult<()> {
        let mut data = self.data()?;

        if matches.get_flag("rm") {
            data.delete_all()?;
            output::print_note("JumpCloud configuration removed");
            return Ok(());
        }

        if let Some(email) = matches.get_one::<String>("email") {
            data.set_email(email);
        }
        if matches.get_flag("password") {
            let password = self.env.prompter.secret("JumpCloud password")?;
            data.set_password(&password);
        }
        if matches.get_flag("rm-session") {
            data.set_session(None)?;
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
impl Provider for JumpCloudProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn list_apps(&self) -> ProviderResult<Vec<SamlApplication>> {
        let mut data = self.data()?;
        if !data.is_configured() {
            debug!("JumpCloud is not configured, no apps to list");
            return Ok(Vec::new());
        }
        let client = self.authenticated_client(&mut data).await?;
        client.applications().await
    }

    async fn saml_request(&self, url: &str) -> ProviderResult<Option<SamlAssertion>> {
        if !url_has_domain(url, SSO_DOMAIN) {
            return Ok(None);
        }
        let mut data = self.data()?;
        if !data.is_configured() {
            return Err(ProviderError::not_configured(PROVIDER_NAME, COMMAND));
        }

        info!(url, "Requesting SAML assertion from JumpCloud");
        let client = self.authenticated_client(&mut data).await?;
        client.saml_request(url).await.map(Some)
    }

    fn extend_cli(&self, command: Command) -> Command {
        command.subcommand(
            Command::new(COMMAND)
                .about("Manage JumpCloud configuration")
                .arg(Arg::new("email").short('e').long("email").help("JumpCloud email"))
                .arg(
                    Arg::new("password")
                        .short('p')
                        .long("password")
                        .action(ArgAction::SetTrue)
                        .help("Prompt for the JumpCloud password"),
                )
                .arg(
                    Arg::new("rm-session")
                        .long("rm-session")
                        .action(ArgAction::SetTrue)
                        .help("Forget the stored JumpCloud session"),
                )
                .arg(
                    Arg::new("rm")
                        .long("rm")
                        .action(ArgAction::SetTrue)
                        .help("Remove all JumpCloud configuration"),
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

/// The one-time code for `totp`; nothing for `duo`.
pub fn prompt_factor_args(factor_type: &str, prompter: &dyn Prompter) -> ProviderResult<Option<String>> {
    match factor_type {
        "totp" => Ok(Some(prompter.text("JumpCloud verification code")?.trim().to_string())),
        "duo" => Ok(None),
        other => Err(ProviderError::UnknownFactor {
            provider: PROVIDER_NAME.to_string(),
            factor_type: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::*;
    use crate::JumpCloudSession;
    use base64::Engine;
    use broker_http::{HttpResponse, Method};
    use provider_hooks::testing::{FixedResolver, ScriptedPrompter, TestEnv};
    use serde_json::json;

    const APP_URL: &str = "https://sso.jumpcloud.com/saml2/aws";
    const XML: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"/>"#;

    fn configure(env: &TestEnv) {
        let mut data = JumpCloudData::open(env.storage.clone()).unwrap();
        data.set_email("user@example.com");
        data.set_password("hunter2");
        data.save().unwrap();
    }

    fn applications() -> HttpResponse {
        HttpResponse::new(200).with_json(&json!([
            {"displayLabel": "AWS", "ssoUrl": APP_URL},
            {"displayLabel": "Slack", "ssoUrl": "https://sso.jumpcloud.com/saml2/slack"}
        ]))
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let env = TestEnv::new();
        let provider = JumpCloudProvider::new(env.env.clone());
        assert!(provider.list_apps().await.unwrap().is_empty());

        let err = provider.saml_request(APP_URL).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(provider
            .saml_request("https://example.okta.com/app/x")
            .await
            .unwrap()
            .is_none());
        assert!(env.http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_saml_request_with_totp() {
        let env = TestEnv::with_prompter(ScriptedPrompter::new().with_choice(0).with_answer("123456"));
        configure(&env);
        env.http.on(Method::GET, SELF, HttpResponse::new(401));
        env.http.on(Method::GET, XSRF, xsrf_response());
        env.http.on(Method::POST, AUTH, mfa_required());
        env.http.on(Method::POST, AUTH_TOTP, HttpResponse::new(200).with_json(&json!({})));
        env.http.on(Method::GET, APPLICATIONS, applications());
        let encoded = base64::engine::general_purpose::STANDARD.encode(XML);
        env.http.on(
            Method::GET,
            APP_URL,
            HttpResponse::new(200).with_body(format!(r#"<input name="SAMLResponse" value="{}">"#, encoded)),
        );

        let provider = JumpCloudProvider::new(env.env.clone());
        let assertion = provider.saml_request(APP_URL).await.unwrap().unwrap();
        assert_eq!(assertion.xml(), XML);
        assert_eq!(
            env.prompter.prompts(),
            vec!["JumpCloud MFA choice", "JumpCloud verification code"]
        );

        let stored = JumpCloudData::open(env.storage.clone()).unwrap();
        assert_eq!(
            stored.session(),
            JumpCloudSession {
                cookie: "fresh-cookie".to_string(),
                xsrf: "xsrf-token".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_list_apps_with_duo() {
        let env = TestEnv::with_prompter(ScriptedPrompter::new().with_choice(1));
        configure(&env);
        env.http.on(Method::GET, SELF, HttpResponse::new(401));
        env.http.on(Method::GET, XSRF, xsrf_response());
        env.http.on(Method::POST, AUTH, mfa_required());
        env.http.on(Method::GET, AUTH_DUO, duo_details());
        env.http.on(Method::POST, AUTH_DUO, HttpResponse::new(200).with_json(&json!({})));
        env.http.on(Method::GET, APPLICATIONS, applications());

        let browser_side = tokio::spawn(complete_duo(env.browser.clone()));
        let provider = JumpCloudProvider::new(env.env.clone());
        let names: Vec<_> = provider.list_apps().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["AWS", "Slack"]);
        assert!(browser_side.await.unwrap().starts_with("HTTP/1.1 200"));
        assert_eq!(env.prompter.statuses(), vec!["Waiting for MFA verification..."]);
    }

    #[tokio::test]
    async fn test_jumpcloud_command() {
        let env = TestEnv::with_prompter(ScriptedPrompter::new().with_answer("s3cret"));
        let provider = JumpCloudProvider::new(env.env.clone());
        let resolver = FixedResolver::unhandled();
        let ctx = CommandContext {
            resolver: &resolver,
            format: OutputFormat::Json,
        };
        let command = provider.extend_cli(Command::new("credbroker"));

        let matches = command
            .clone()
            .get_matches_from(["credbroker", "jumpcloud", "-e", "user@example.com", "-p"]);
        let (name, sub) = matches.subcommand().unwrap();
        provider.run_command(name, sub, &ctx).await.unwrap().unwrap();
        assert!(JumpCloudData::open(env.storage.clone()).unwrap().is_configured());

        let matches = command.get_matches_from(["credbroker", "jumpcloud", "--rm"]);
        let (name, sub) = matches.subcommand().unwrap();
        provider.run_command(name, sub, &ctx).await.unwrap().unwrap();
        assert!(env.storage.raw("jumpcloud").is_none());
    }
}
