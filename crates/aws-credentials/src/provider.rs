use crate::{
    normalize_start_url, sso_accounts, AwsApi, AwsCache, AwsContext, AwsResult, AwsSdkApi,
    CredentialSource, RoleCredentials, PROVIDER_NAME,
};
use async_trait::async_trait;
use broker_storage::Cacheable;
use clap::{Arg, ArgAction, ArgMatches, Command};
use provider_hooks::output::{self, OutputFormat};
use provider_hooks::{Aliases, CommandContext, Provider, ProviderEnv, ProviderError, ProviderResult, SamlResolver};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const COMMAND: &str = "aws";

/// AWS as a credential provider: it answers no SAML URLs itself but adds
/// the `aws` command family that defines, renews and hands out named role
/// credentials.
pub struct AwsProvider {
    env: ProviderEnv,
    api: Arc<dyn AwsApi>,
}

impl AwsProvider {
    pub fn new(env: ProviderEnv, api: Arc<dyn AwsApi>) -> Self {
        Self { env, api }
    }

    pub fn factory(env: &ProviderEnv) -> ProviderResult<Arc<dyn Provider>> {
        let api = AwsSdkApi::new(&env.config.sso_region);
        Ok(Arc::new(Self::new(env.clone(), Arc::new(api))))
    }

    fn cache(&self) -> AwsResult<AwsCache> {
        AwsCache::open(self.env.storage.clone())
    }

    fn context<'a>(&'a self, cache: &'a AwsCache, resolver: &'a dyn SamlResolver) -> AwsContext<'a> {
        AwsContext {
            cache,
            api: self.api.as_ref(),
            browser: self.env.browser.as_ref(),
            prompter: self.env.prompter.as_ref(),
            resolver,
            client_name: &self.env.config.sso_client_name,
            device_auth_timeout: self.env.config.device_auth_timeout(),
        }
    }

    async fn run(&self, matches: &ArgMatches, ctx: &CommandContext<'_>) -> AwsResult<()> {
        let cache = self.cache()?;
        let aws = self.context(&cache, ctx.resolver);

        match matches.subcommand() {
            Some(("add-sso", sub)) => {
                let start_url = normalize_start_url(arg(sub, "start_url"));
                let credentials =
                    RoleCredentials::sso(arg(sub, "name"), &start_url, arg(sub, "account_id"), arg(sub, "role_name"))?;
                self.add(&aws, with_options(credentials, sub), ctx.format).await
            }
            Some(("add-saml", sub)) => {
                let aliases = Aliases::open(self.env.storage.clone())?;
                let saml_url = aliases.resolve(arg(sub, "alias_or_url"))?;
                let name = sub
                    .get_one::<String>("name")
                    .map(String::as_str)
                    .unwrap_or(arg(sub, "alias_or_url"));
                let credentials = RoleCredentials::saml(name, &saml_url)?;
                self.add(&aws, with_options(credentials, sub), ctx.format).await
            }
            Some(("ls", _)) => self.list(&cache, ctx.format),
            Some(("export", sub)) => {
                let credentials = renewed(&aws, sub).await?;
                println!("{}", credentials.env_export());
                Ok(())
            }
            Some(("exec", sub)) => {
                let credentials = renewed(&aws, sub).await?;
                let command: Vec<String> = sub
                    .get_many::<String>("command")
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default();

                let status = match credentials.exec(&command).await {
                    Ok(status) => status,
                    Err(e) => match e.exit_code() {
                        Some(code) => {
                            output::print_note(&format!("{}: {}", broker_config_and_utils::APP_NAME, e));
                            code
                        }
                        None => return Err(e),
                    },
                };
                if status == 0 {
                    Ok(())
                } else {
                    Err(ProviderError::Exit(status).into())
                }
            }
            Some(("mv", sub)) => {
                cache.mv(arg(sub, "current_name"), arg(sub, "new_name"))?;
                self.list(&cache, ctx.format)
            }
            Some(("rm", sub)) => {
                if sub.get_flag("all") {
                    cache.delete_all()?;
                } else if let Some(name) = sub.get_one::<String>("name") {
                    cache.rm(name)?;
                }
                self.list(&cache, ctx.format)
            }
            Some(("sso-accounts", sub)) => {
                let start_url = normalize_start_url(arg(sub, "start_url"));
                let accounts = sso_accounts(&aws, &start_url, sub.get_flag("force")).await?;
                match ctx.format {
                    OutputFormat::Json => output::print_json(&accounts),
                    OutputFormat::Text => {
                        let rows: Vec<Vec<String>> = accounts
                            .iter()
                            .map(|a| {
                                vec![
                                    a.account_id.clone(),
                                    a.account_name.clone(),
                                    a.email_address.clone(),
                                    a.roles.join(", "),
                                ]
                            })
                            .collect();
                        output::print_table(&["Account ID", "Name", "Email", "Roles"], &rows);
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Define (or redefine) credentials and obtain them right away.
    async fn add(&self, aws: &AwsContext<'_>, mut credentials: RoleCredentials, format: OutputFormat) -> AwsResult<()> {
        info!(name = %credentials.name, source = credentials.source.kind(), "Adding role credentials");
        aws.cache.forget(&credentials.name);
        credentials.renew(aws, true).await?;
        self.list(aws.cache, format)
    }

    fn list(&self, cache: &AwsCache, format: OutputFormat) -> AwsResult<()> {
        let credentials = cache.list();
        let aliases = Aliases::open(self.env.storage.clone())?;

        if format == OutputFormat::Json {
            let listed: Vec<Value> = credentials.iter().map(|c| summary(c, &aliases)).collect();
            output::print_json(&listed);
            return Ok(());
        }

        if credentials.is_empty() {
            output::print_note("No credentials");
            return Ok(());
        }
        let rows: Vec<Vec<String>> = credentials
            .iter()
            .map(|c| {
                let (source, role) = describe_source(c, &aliases);
                vec![c.name.clone(), source, role, c.assume_role_arn.clone(), c.ttl_display()]
            })
            .collect();
        output::print_table(&["Name", "Source", "Role", "Assumed Role", "TTL"], &rows);
        Ok(())
    }
}

fn arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches.get_one::<String>(id).map(String::as_str).unwrap_or_default()
}

fn with_options(credentials: RoleCredentials, matches: &ArgMatches) -> RoleCredentials {
    let value = |id: &str| matches.get_one::<String>(id).map(String::as_str);
    credentials
        .with_assume_role(value("assume_role_arn"), value("external_id"))
        .with_sts_endpoint(value("sts_endpoint"))
}

async fn renewed(aws: &AwsContext<'_>, matches: &ArgMatches) -> AwsResult<RoleCredentials> {
    let mut credentials = aws.cache.credentials(arg(matches, "name"))?;
    credentials.renew(aws, matches.get_flag("force")).await?;
    Ok(credentials)
}

/// `(source, role)` columns: the start URL and account/role for SSO, the
/// app's aliases (or its URL) for SAML.
fn describe_source(credentials: &RoleCredentials, aliases: &Aliases) -> (String, String) {
    match &credentials.source {
        CredentialSource::Sso {
            start_url,
            account_id,
            role_name,
        } => (start_url.clone(), format!("{}/{}", account_id, role_name)),
        CredentialSource::Saml { saml_url } => {
            let names = aliases.aliases_for(saml_url);
            let source = if names.is_empty() { saml_url.clone() } else { names.join(", ") };
            (source, String::new())
        }
    }
}

/// Listing entry without the key triple.
fn summary(credentials: &RoleCredentials, aliases: &Aliases) -> Value {
    let mut entry = json!({
        "name": credentials.name,
        "type": credentials.source.kind(),
        "assume_role_arn": credentials.assume_role_arn,
        "sts_endpoint": credentials.sts_endpoint,
        "expiration_timestamp": credentials.expiration_timestamp,
        "ttl": credentials.ttl_display(),
    });
    let source = match &credentials.source {
        CredentialSource::Sso {
            start_url,
            account_id,
            role_name,
        } => json!({"start_url": start_url, "account_id": account_id, "role_name": role_name}),
        CredentialSource::Saml { saml_url } => json!({"saml_url": saml_url, "aliases": aliases.aliases_for(saml_url)}),
    };
    if let (Some(entry), Value::Object(source)) = (entry.as_object_mut(), source) {
        entry.extend(source);
    }
    entry
}

fn name_arg() -> Arg {
    Arg::new("name").required(true).help("Credentials name")
}

fn force_arg() -> Arg {
    Arg::new("force")
        .short('f')
        .long("force")
        .action(ArgAction::SetTrue)
        .help("Renew even if the cached credentials are still valid")
}

/// Options shared by the `add-*` commands.
fn add_options(command: Command) -> Command {
    command
        .arg(
            Arg::new("assume_role_arn")
                .short('r')
                .long("assume-role-arn")
                .help("ARN of a secondary role to assume"),
        )
        .arg(
            Arg::new("external_id")
                .short('x')
                .long("external-id")
                .help("External id for the secondary role"),
        )
        .arg(
            Arg::new("sts_endpoint")
                .short('e')
                .long("sts-endpoint")
                .help("STS endpoint URL"),
        )
}

#[async_trait]
impl Provider for AwsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn extend_cli(&self, command: Command) -> Command {
        command.subcommand(
            Command::new(COMMAND)
                .about("Manage AWS credentials")
                .subcommand_required(true)
                .subcommand(add_options(
                    Command::new("add-sso")
                        .about("Add AWS SSO role credentials")
                        .arg(name_arg())
                        .arg(Arg::new("start_url").required(true).help("SSO start URL or subdomain"))
                        .arg(Arg::new("account_id").required(true).help("AWS account id"))
                        .arg(Arg::new("role_name").required(true).help("Role name")),
                ))
                .subcommand(add_options(
                    Command::new("add-saml")
                        .about("Add SAML role credentials for an SSO application")
                        .arg(Arg::new("alias_or_url").required(true).help("Application alias or URL"))
                        .arg(
                            Arg::new("name")
                                .short('n')
                                .long("name")
                                .help("Credentials name (defaults to the alias or URL)"),
                        ),
                ))
                .subcommand(Command::new("ls").about("List credentials"))
                .subcommand(
                    Command::new("export")
                        .about("Print AWS_* variables for eval in a shell")
                        .arg(name_arg())
                        .arg(force_arg()),
                )
                .subcommand(
                    Command::new("exec")
                        .about("Run a command with AWS_* variables set")
                        .arg(name_arg())
                        .arg(force_arg())
                        .arg(
                            Arg::new("command")
                                .num_args(0..)
                                .trailing_var_arg(true)
                                .allow_hyphen_values(true)
                                .help("Command and arguments"),
                        ),
                )
                .subcommand(
                    Command::new("mv")
                        .about("Rename credentials")
                        .arg(Arg::new("current_name").required(true))
                        .arg(Arg::new("new_name").required(true)),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Remove credentials")
                        .arg(Arg::new("name").help("Credentials name"))
                        .arg(
                            Arg::new("all")
                                .short('a')
                                .long("all")
                                .action(ArgAction::SetTrue)
                                .help("Remove all credentials and the SSO cache"),
                        ),
                )
                .subcommand(
                    Command::new("sso-accounts")
                        .about("List accounts and roles available through AWS SSO")
                        .arg(Arg::new("start_url").required(true).help("SSO start URL or subdomain"))
                        .arg(force_arg()),
                ),
        )
    }

    async fn run_command(
        &self,
        name: &str,
        matches: &ArgMatches,
        ctx: &CommandContext<'_>,
    ) -> Option<ProviderResult<()>> {
        if name != COMMAND {
            return None;
        }
        Some(self.run(matches, ctx).await.map_err(ProviderError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assertion_with, MockAwsApi, ROLE};
    use crate::ROLE_ATTRIBUTE;
    use provider_hooks::testing::{FixedResolver, TestEnv};

    const SAML_URL: &str = "https://example.okta.com/app/amazon_aws/exk1/sso/saml";
    const CHAINED_ROLE: &str = "arn:aws:iam::210987654321:role/Chained";

    struct Harness {
        env: TestEnv,
        api: Arc<MockAwsApi>,
        provider: AwsProvider,
        resolver: FixedResolver,
    }

    impl Harness {
        fn new() -> Self {
            let env = TestEnv::new();
            let api = Arc::new(MockAwsApi::new());
            let provider = AwsProvider::new(env.env.clone(), api.clone());
            let resolver = FixedResolver::new(assertion_with(&[(ROLE_ATTRIBUTE, ROLE)]));
            Self {
                env,
                api,
                provider,
                resolver,
            }
        }

        async fn run(&self, args: &[&str]) -> Option<ProviderResult<()>> {
            let ctx = CommandContext {
                resolver: &self.resolver,
                format: OutputFormat::Text,
            };
            let command = self.provider.extend_cli(Command::new("credbroker"));
            let matches = command.get_matches_from([&["credbroker"][..], args].concat());
            let (name, sub) = matches.subcommand()?;
            self.provider.run_command(name, sub, &ctx).await
        }

        fn cache(&self) -> AwsCache {
            AwsCache::open(self.env.storage.clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_add_saml_through_alias() {
        let harness = Harness::new();
        let mut aliases = Aliases::open(harness.env.storage.clone()).unwrap();
        aliases.add("prod", SAML_URL).unwrap();

        harness
            .run(&["aws", "add-saml", "prod", "-r", CHAINED_ROLE, "-x", "ext"])
            .await
            .unwrap()
            .unwrap();

        let stored = harness.cache().credentials("prod").unwrap();
        assert_eq!(stored.source, CredentialSource::Saml { saml_url: SAML_URL.to_string() });
        assert_eq!(stored.assume_role_arn, CHAINED_ROLE);
        assert_eq!(stored.assume_role_external_id, "ext");
        assert_eq!(stored.access_key_id, harness.api.chained_credentials.access_key_id);
        assert_eq!(harness.resolver.calls(), vec![SAML_URL]);
    }

    #[tokio::test]
    async fn test_redefining_does_not_inherit_old_options() {
        let harness = Harness::new();
        harness
            .run(&["aws", "add-saml", SAML_URL, "-n", "prod", "-r", CHAINED_ROLE])
            .await
            .unwrap()
            .unwrap();
        harness
            .run(&["aws", "add-saml", SAML_URL, "-n", "prod"])
            .await
            .unwrap()
            .unwrap();

        let stored = harness.cache().credentials("prod").unwrap();
        assert!(stored.assume_role_arn.is_empty());
        assert_eq!(stored.access_key_id, harness.api.saml_credentials.access_key_id);
    }

    #[tokio::test]
    async fn test_add_sso_normalizes_subdomain() {
        let harness = Harness::new();
        harness
            .run(&["aws", "add-sso", "dev", "example", "123456789012", "Dev"])
            .await
            .unwrap()
            .unwrap();

        let stored = harness.cache().credentials("dev").unwrap();
        assert!(matches!(
            stored.source,
            CredentialSource::Sso { ref start_url, .. } if start_url == "https://example.awsapps.com/start#/"
        ));
        assert_eq!(harness.env.browser.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_export_reuses_cached_credentials_unless_forced() {
        let harness = Harness::new();
        harness
            .run(&["aws", "add-saml", SAML_URL, "-n", "prod"])
            .await
            .unwrap()
            .unwrap();
        let calls = harness.api.calls().len();

        harness.run(&["aws", "export", "prod"]).await.unwrap().unwrap();
        assert_eq!(harness.api.calls().len(), calls);

        harness.run(&["aws", "export", "prod", "--force"]).await.unwrap().unwrap();
        assert_eq!(harness.api.count("assume_role_with_saml"), 2);
    }

    #[tokio::test]
    async fn test_export_unknown_name() {
        let harness = Harness::new();
        let err = harness.run(&["aws", "export", "nope"]).await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "AWS: No such credentials: nope");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_reports_exit_status() {
        let harness = Harness::new();
        harness
            .run(&["aws", "add-saml", SAML_URL, "-n", "prod"])
            .await
            .unwrap()
            .unwrap();

        harness
            .run(&["aws", "exec", "prod", "--", "sh", "-c", "test -n \"$AWS_SESSION_TOKEN\""])
            .await
            .unwrap()
            .unwrap();

        let err = harness
            .run(&["aws", "exec", "prod", "sh", "-c", "exit 4"])
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ProviderError::Exit(4)));

        let err = harness
            .run(&["aws", "exec", "prod", "credbroker-no-such-command"])
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ProviderError::Exit(127)));
    }

    #[tokio::test]
    async fn test_mv_and_rm() {
        let harness = Harness::new();
        harness
            .run(&["aws", "add-saml", SAML_URL, "-n", "prod"])
            .await
            .unwrap()
            .unwrap();

        harness.run(&["aws", "mv", "prod", "production"]).await.unwrap().unwrap();
        assert!(harness.cache().contains("production"));
        assert!(!harness.cache().contains("prod"));

        harness.run(&["aws", "rm", "production"]).await.unwrap().unwrap();
        assert!(harness.cache().list().is_empty());

        harness.run(&["aws", "add-saml", SAML_URL, "-n", "prod"]).await.unwrap().unwrap();
        harness.run(&["aws", "rm", "--all"]).await.unwrap().unwrap();
        assert!(harness.env.storage.raw(crate::AWS_RECORD).is_none());
    }

    #[tokio::test]
    async fn test_sso_accounts_command() {
        let harness = Harness::new();
        harness
            .run(&["aws", "sso-accounts", "example"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(harness.api.count("list_accounts"), 1);
    }

    #[tokio::test]
    async fn test_other_commands_are_not_handled() {
        let harness = Harness::new();
        let ctx = CommandContext {
            resolver: &harness.resolver,
            format: OutputFormat::Text,
        };
        let matches = ArgMatches::default();
        assert!(harness.provider.run_command("okta", &matches, &ctx).await.is_none());
        assert_eq!(harness.provider.name(), "AWS");
    }

    #[test]
    fn test_summary_omits_secrets() {
        let harness = Harness::new();
        let aliases = Aliases::open(harness.env.storage.clone()).unwrap();
        let mut credentials = RoleCredentials::saml("prod", SAML_URL).unwrap();
        credentials.secret_access_key = "secret".to_string();

        let entry = summary(&credentials, &aliases);
        assert_eq!(entry["type"], "saml");
        assert_eq!(entry["saml_url"], SAML_URL);
        assert!(entry.get("secret_access_key").is_none());
        assert!(entry.get("session_token").is_none());
    }
}
