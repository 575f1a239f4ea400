//! Named role credentials: where they come from, how they renew and how
//! they are handed to commands.

use crate::api::{AssumeRoleRequest, SamlRoleRequest, TemporaryCredentials};
use crate::sso::sso_access_token;
use crate::{AwsCache, AwsContext, AwsError, AwsResult, ROLE_ATTRIBUTE, SESSION_DURATION_ATTRIBUTE};
use broker_config_and_utils::CoreError;
use broker_storage::{require_fields, Cacheable};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tracing::{debug, info};

/// Identity the primary credentials are obtained with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialSource {
    /// A role assignment reached through AWS SSO.
    Sso {
        start_url: String,
        account_id: String,
        role_name: String,
    },
    /// An SSO application whose SAML assertion is exchanged at STS.
    Saml { saml_url: String },
}

impl CredentialSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sso { .. } => "sso",
            Self::Saml { .. } => "saml",
        }
    }
}

/// Cached temporary credentials stored under `credentials.<name>`.
///
/// When `assume_role_arn` is set, the primary credentials are only used to
/// assume that role and the key triple holds the chained credentials; the
/// source is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleCredentials {
    pub name: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub expiration_timestamp: f64,
    #[serde(default)]
    pub assume_role_arn: String,
    #[serde(default)]
    pub assume_role_external_id: String,
    #[serde(default)]
    pub sts_endpoint: String,
    #[serde(flatten)]
    pub source: CredentialSource,
}

impl Cacheable for RoleCredentials {
    fn expiration_timestamp(&self) -> f64 {
        self.expiration_timestamp
    }
}

impl RoleCredentials {
    pub fn sso(name: &str, start_url: &str, account_id: &str, role_name: &str) -> AwsResult<Self> {
        require_fields(
            "SSO role credentials",
            &[
                ("name", name),
                ("start_url", start_url),
                ("account_id", account_id),
                ("role_name", role_name),
            ],
        )?;
        Ok(Self::with_source(
            name,
            CredentialSource::Sso {
                start_url: start_url.to_string(),
                account_id: account_id.to_string(),
                role_name: role_name.to_string(),
            },
        ))
    }

    pub fn saml(name: &str, saml_url: &str) -> AwsResult<Self> {
        require_fields("SAML role credentials", &[("name", name), ("saml_url", saml_url)])?;
        Ok(Self::with_source(
            name,
            CredentialSource::Saml {
                saml_url: saml_url.to_string(),
            },
        ))
    }

    fn with_source(name: &str, source: CredentialSource) -> Self {
        Self {
            name: name.to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: String::new(),
            expiration_timestamp: 0.0,
            assume_role_arn: String::new(),
            assume_role_external_id: String::new(),
            sts_endpoint: String::new(),
            source,
        }
    }

    pub fn with_assume_role(mut self, role_arn: Option<&str>, external_id: Option<&str>) -> Self {
        self.assume_role_arn = role_arn.unwrap_or_default().to_string();
        self.assume_role_external_id = external_id.unwrap_or_default().to_string();
        self
    }

    pub fn with_sts_endpoint(mut self, endpoint: Option<&str>) -> Self {
        self.sts_endpoint = endpoint.unwrap_or_default().to_string();
        self
    }

    fn sts_endpoint(&self) -> Option<&str> {
        Some(self.sts_endpoint.as_str()).filter(|e| !e.is_empty())
    }

    /// Fill unset fields from the cached entry of the same name. An entry
    /// from the other source kind is ignored.
    pub fn load(&mut self, cache: &AwsCache) -> AwsResult<()> {
        let Some(cached) = cache.credentials_slot(&self.name) else {
            return Ok(());
        };
        let cached_is_sso = cached.get("start_url").is_some();
        if cached_is_sso != matches!(self.source, CredentialSource::Sso { .. }) {
            debug!(name = %self.name, "Cached credentials have another source, not loading");
            return Ok(());
        }
        self.hydrate_from(&cached)?;
        Ok(())
    }

    /// Obtain fresh credentials unless the cached ones are still valid.
    /// Returns whether AWS was called.
    pub async fn renew(&mut self, ctx: &AwsContext<'_>, force: bool) -> AwsResult<bool> {
        self.load(ctx.cache)?;
        if !self.needs_renewal(force) {
            debug!(name = %self.name, ttl = %self.ttl_display(), "Reusing cached role credentials");
            return Ok(false);
        }

        info!(name = %self.name, source = self.source.kind(), "Renewing role credentials");
        let primary = match &self.source {
            CredentialSource::Sso {
                start_url,
                account_id,
                role_name,
            } => {
                let access_token = sso_access_token(ctx, start_url, false).await?;
                ctx.api
                    .get_role_credentials(&access_token, account_id, role_name)
                    .await?
            }
            CredentialSource::Saml { saml_url } => self.exchange_saml(ctx, saml_url).await?,
        };
        self.apply(primary);

        if !self.assume_role_arn.is_empty() {
            let chained = self.assume_role(ctx).await?;
            self.apply(chained);
        }

        ctx.cache.set_credentials(self)?;
        Ok(true)
    }

    async fn exchange_saml(&self, ctx: &AwsContext<'_>, saml_url: &str) -> AwsResult<TemporaryCredentials> {
        let assertion = ctx.resolver.resolve_saml(saml_url).await?;
        let attributes = assertion.attributes();

        let (role_arn, principal_arn) = attributes
            .first(ROLE_ATTRIBUTE)
            .and_then(|role| role.split_once(','))
            .ok_or(AwsError::NoRoleArn)?;
        let duration_seconds = attributes
            .first(SESSION_DURATION_ATTRIBUTE)
            .and_then(|duration| duration.trim().parse::<i64>().ok());

        let request = SamlRoleRequest {
            role_arn: role_arn.trim().to_string(),
            principal_arn: principal_arn.trim().to_string(),
            saml_assertion: assertion.b64encoded().to_string(),
            duration_seconds,
        };
        debug!(role_arn = %request.role_arn, duration_seconds = ?duration_seconds, "Assuming role with SAML");
        ctx.api.assume_role_with_saml(&request, self.sts_endpoint()).await
    }

    /// Assume `assume_role_arn` with the current credentials, reusing the
    /// caller's session name.
    async fn assume_role(&self, ctx: &AwsContext<'_>) -> AwsResult<TemporaryCredentials> {
        let current = self.temporary();
        let caller_arn = ctx.api.get_caller_identity(&current, self.sts_endpoint()).await?;

        let request = AssumeRoleRequest {
            role_arn: self.assume_role_arn.clone(),
            role_session_name: role_session_name(&caller_arn).to_string(),
            external_id: Some(self.assume_role_external_id.clone()).filter(|id| !id.is_empty()),
        };
        info!(role_arn = %request.role_arn, session = %request.role_session_name, "Assuming secondary role");
        ctx.api.assume_role(&current, &request, self.sts_endpoint()).await
    }

    fn temporary(&self) -> TemporaryCredentials {
        TemporaryCredentials {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            session_token: self.session_token.clone(),
            expiration_timestamp: self.expiration_timestamp,
        }
    }

    fn apply(&mut self, credentials: TemporaryCredentials) {
        self.access_key_id = credentials.access_key_id;
        self.secret_access_key = credentials.secret_access_key;
        self.session_token = credentials.session_token;
        self.expiration_timestamp = credentials.expiration_timestamp;
    }

    pub fn env_vars(&self) -> [(&'static str, &str); 3] {
        [
            ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.as_str()),
            ("AWS_SESSION_TOKEN", self.session_token.as_str()),
        ]
    }

    /// `export` lines for `eval` in a POSIX shell.
    pub fn env_export(&self) -> String {
        self.env_vars()
            .iter()
            .map(|(key, value)| format!("export {}='{}'", key, value.replace('\'', r"'\''")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run `command` with the credentials in its environment and return its
    /// exit status. An empty command does nothing and succeeds.
    pub async fn exec(&self, command: &[String]) -> AwsResult<i32> {
        let Some((program, args)) = command.split_first() else {
            return Ok(0);
        };

        debug!(name = %self.name, program = %program, "Running command with role credentials");
        let status = tokio::process::Command::new(program)
            .args(args)
            .envs(self.env_vars())
            .status()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => AwsError::PermissionDenied(program.clone()),
                ErrorKind::NotFound => AwsError::CommandNotFound(program.clone()),
                _ => AwsError::Core(CoreError::Io(e)),
            })?;

        // Killed by a signal: report it like a shell would.
        Ok(status.code().unwrap_or(1))
    }
}

/// Session name part of an assumed-role ARN
/// (`arn:aws:sts::<account>:assumed-role/<role>/<session>`).
fn role_session_name(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}
