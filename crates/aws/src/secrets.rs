//! AWS Secrets Manager fetcher with auto-negotiating dual-mode (API + CLI)

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use cleanenv_secrets::{FetchMode, Provider, SecretError, SecretFetcher, SecureSecret};
use std::path::PathBuf;
use tokio::process::Command;

/// Fetches secrets from AWS Secrets Manager
///
/// The default [`FetchMode::Api`] resolves credentials through the SDK's
/// default provider chain. [`FetchMode::Auto`] picks the API when an
/// [`SdkConfig`] was supplied or the environment points at a source that
/// chain understands:
/// - static keys (`AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`)
/// - a named profile (`AWS_PROFILE`) or a shared config/credentials file
/// - web identity (`AWS_WEB_IDENTITY_TOKEN_FILE`, as used by IRSA)
/// - container credentials (`AWS_CONTAINER_CREDENTIALS_*_URI`)
///
/// and falls back to the `aws` CLI otherwise.
///
/// Identifiers are secret names or ARNs. In API mode the shared configuration
/// is resolved through the default provider chain on every call unless an
/// explicit [`SdkConfig`] was injected.
#[derive(Clone)]
pub struct AwsFetcher {
    use_api: bool,
    region: Option<String>,
    endpoint_url: Option<String>,
    sdk_config: Option<SdkConfig>,
}

impl std::fmt::Debug for AwsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsFetcher")
            .field("mode", &self.mode_name())
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("sdk_config", &self.sdk_config.is_some())
            .finish()
    }
}

impl Default for AwsFetcher {
    fn default() -> Self {
        Self::new(FetchMode::default())
    }
}

/// Builder for [`AwsFetcher`]
#[derive(Debug, Default)]
pub struct AwsFetcherBuilder {
    mode: FetchMode,
    region: Option<String>,
    endpoint_url: Option<String>,
    sdk_config: Option<SdkConfig>,
}

impl AwsFetcherBuilder {
    /// How to reach Secrets Manager (defaults to [`FetchMode::Api`])
    #[must_use]
    pub const fn mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the region discovered from the environment
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Send requests to a custom endpoint (e.g. LocalStack)
    #[must_use]
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Use an explicit shared configuration instead of the default chain
    #[must_use]
    pub fn sdk_config(mut self, sdk_config: SdkConfig) -> Self {
        self.sdk_config = Some(sdk_config);
        self
    }

    /// Build the fetcher, resolving [`FetchMode::Auto`] now
    #[must_use]
    pub fn build(self) -> AwsFetcher {
        let use_api = match self.mode {
            FetchMode::Api => true,
            FetchMode::Cli => false,
            FetchMode::Auto => {
                self.sdk_config.is_some() || AwsFetcher::api_credentials_available()
            }
        };
        if !use_api {
            tracing::debug!("No AWS credential source found in environment, using aws CLI");
        }
        AwsFetcher {
            use_api,
            region: self.region,
            endpoint_url: self.endpoint_url,
            sdk_config: self.sdk_config,
        }
    }
}

impl AwsFetcher {
    /// Create a fetcher using `mode` and the default configuration chain
    #[must_use]
    pub fn new(mode: FetchMode) -> Self {
        Self::builder().mode(mode).build()
    }

    /// Start building a fetcher with explicit configuration
    #[must_use]
    pub fn builder() -> AwsFetcherBuilder {
        AwsFetcherBuilder::default()
    }

    /// Check if the default provider chain has a credential source to use
    fn api_credentials_available() -> bool {
        let set = |name: &str| std::env::var_os(name).is_some();
        (set("AWS_ACCESS_KEY_ID") && set("AWS_SECRET_ACCESS_KEY"))
            || set("AWS_PROFILE")
            || set("AWS_WEB_IDENTITY_TOKEN_FILE")
            || set("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
            || set("AWS_CONTAINER_CREDENTIALS_FULL_URI")
            || Self::shared_files().iter().any(|path| path.is_file())
    }

    /// Shared config and credentials files, honouring the path overrides
    fn shared_files() -> Vec<PathBuf> {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        [
            ("AWS_SHARED_CREDENTIALS_FILE", "credentials"),
            ("AWS_CONFIG_FILE", "config"),
        ]
        .into_iter()
        .filter_map(|(var, file)| {
            std::env::var_os(var)
                .map(PathBuf::from)
                .or_else(|| home.as_ref().map(|home| home.join(".aws").join(file)))
        })
        .collect()
    }

    /// Whether requests go through the AWS SDK
    #[must_use]
    pub const fn uses_api(&self) -> bool {
        self.use_api
    }

    const fn mode_name(&self) -> &'static str {
        if self.use_api { "api" } else { "cli" }
    }

    /// Resolve the shared configuration for one call
    async fn load_config(&self, identifier: &str) -> Result<SdkConfig, SecretError> {
        let config = if let Some(config) = &self.sdk_config {
            config.clone()
        } else {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = &self.region {
                loader = loader.region(Region::new(region.clone()));
            }
            loader.load().await
        };

        let config_error = |message: &str| SecretError::ClientConfig {
            provider: Provider::Aws,
            identifier: identifier.to_string(),
            message: message.to_string(),
        };
        if config.region().is_none() && self.region.is_none() {
            return Err(config_error(
                "no region configured (set AWS_REGION or a profile region)",
            ));
        }
        if config.credentials_provider().is_none() {
            return Err(config_error("no credentials provider configured"));
        }
        Ok(config)
    }

    /// Fetch using the AWS SDK
    async fn access_api(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        let config = self.load_config(identifier).await?;

        let mut builder = aws_sdk_secretsmanager::config::Builder::from(&config);
        if let Some(region) = &self.region {
            builder = builder.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.build());

        let response = client
            .get_secret_value()
            .secret_id(identifier)
            .send()
            .await
            .map_err(|e| {
                SecretError::fetch(
                    Provider::Aws,
                    identifier,
                    format!("AWS Secrets Manager error: {}", DisplayErrorContext(&e)),
                )
            })?;

        string_payload(
            identifier,
            response.secret_string().map(str::to_string),
            response.secret_binary().is_some(),
        )
    }

    /// Fetch using the AWS CLI
    async fn access_cli(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        let mut args = vec![
            "secretsmanager".to_string(),
            "get-secret-value".to_string(),
            "--secret-id".to_string(),
            identifier.to_string(),
            "--query".to_string(),
            "SecretString".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];

        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }

        if let Some(endpoint) = &self.endpoint_url {
            args.push("--endpoint-url".to_string());
            args.push(endpoint.clone());
        }

        let output = Command::new("aws")
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SecretError::ClientInit {
                provider: Provider::Aws,
                identifier: identifier.to_string(),
                message: format!("Failed to execute aws CLI: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SecretError::fetch(
                Provider::Aws,
                identifier,
                format!("aws CLI failed: {}", stderr.trim()),
            ));
        }

        let secret_string = parse_cli_output(identifier, &output.stdout)?;
        string_payload(identifier, secret_string, false)
    }
}

#[async_trait]
impl SecretFetcher for AwsFetcher {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn access(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        tracing::debug!(identifier, mode = self.mode_name(), "Getting AWS secret value");
        if self.use_api {
            return self.access_api(identifier).await;
        }
        self.access_cli(identifier).await
    }
}

/// Accept only string payloads; binary secrets are unsupported
fn string_payload(
    identifier: &str,
    secret_string: Option<String>,
    has_binary: bool,
) -> Result<SecureSecret, SecretError> {
    if let Some(value) = secret_string {
        return Ok(SecureSecret::new(value));
    }
    if has_binary {
        tracing::warn!(identifier, "AWS secret only has a binary payload");
    }
    Err(SecretError::EmptyOrUnsupported {
        provider: Provider::Aws,
        identifier: identifier.to_string(),
    })
}

/// Parse `--query SecretString --output json`: a JSON string, or `null`
/// when the secret has no string payload
fn parse_cli_output(identifier: &str, stdout: &[u8]) -> Result<Option<String>, SecretError> {
    serde_json::from_slice::<Option<String>>(stdout).map_err(|e| {
        SecretError::fetch(
            Provider::Aws,
            identifier,
            format!("Unexpected aws CLI output: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleanenv_secrets::FetchContext;
    use std::ffi::OsString;
    use std::path::Path;

    #[test]
    fn test_string_payload() {
        let value = string_payload("db", Some("secretB".to_string()), false).unwrap();
        assert_eq!(value.expose(), "secretB");
    }

    #[test]
    fn test_string_payload_prefers_string_over_binary() {
        let value = string_payload("db", Some("text".to_string()), true).unwrap();
        assert_eq!(value.expose(), "text");
    }

    #[test]
    fn test_binary_only_payload_is_unsupported() {
        let err = string_payload("db", None, true).unwrap_err();
        assert!(matches!(
            err,
            SecretError::EmptyOrUnsupported {
                provider: Provider::Aws,
                ref identifier,
            } if identifier == "db"
        ));
    }

    #[test]
    fn test_absent_payload_is_unsupported() {
        assert!(matches!(
            string_payload("db", None, false),
            Err(SecretError::EmptyOrUnsupported { .. })
        ));
    }

    #[test]
    fn test_parse_cli_output() {
        assert_eq!(
            parse_cli_output("db", b"\"p@ss\\nword\"\n").unwrap(),
            Some("p@ss\nword".to_string())
        );
        assert_eq!(parse_cli_output("db", b"null\n").unwrap(), None);
        assert!(parse_cli_output("db", b"None").is_err());
    }

    #[test]
    fn test_explicit_modes() {
        assert!(AwsFetcher::new(FetchMode::Api).uses_api());
        assert!(!AwsFetcher::new(FetchMode::Cli).uses_api());
    }

    /// Every variable Auto detection reads, unset, with `HOME` pointing at
    /// an empty directory so no shared files are found
    fn bare_env(home: &Path) -> Vec<(&'static str, Option<OsString>)> {
        let mut vars: Vec<_> = [
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "AWS_PROFILE",
            "AWS_WEB_IDENTITY_TOKEN_FILE",
            "AWS_ROLE_ARN",
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
            "AWS_CONTAINER_CREDENTIALS_FULL_URI",
            "AWS_SHARED_CREDENTIALS_FILE",
            "AWS_CONFIG_FILE",
        ]
        .into_iter()
        .map(|name| (name, None))
        .collect();
        vars.push(("HOME", Some(home.as_os_str().to_os_string())));
        vars
    }

    fn with_env(home: &Path, set: &[(&'static str, &str)], check: impl FnOnce()) {
        let mut vars = bare_env(home);
        for &(name, value) in set {
            vars.retain(|&(existing, _)| existing != name);
            vars.push((name, Some(OsString::from(value))));
        }
        temp_env::with_vars(vars, check);
    }

    #[test]
    fn test_auto_mode_with_static_credentials() {
        let home = tempfile::tempdir().unwrap();
        with_env(
            home.path(),
            &[
                ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
            ],
            || assert!(AwsFetcher::new(FetchMode::Auto).uses_api()),
        );
    }

    #[test]
    fn test_auto_mode_with_profile() {
        let home = tempfile::tempdir().unwrap();
        with_env(home.path(), &[("AWS_PROFILE", "prod")], || {
            assert!(AwsFetcher::new(FetchMode::Auto).uses_api());
        });
    }

    #[test]
    fn test_auto_mode_with_web_identity() {
        let home = tempfile::tempdir().unwrap();
        let token = home.path().join("token");
        std::fs::write(&token, "eyJhbGciOi").unwrap();
        with_env(
            home.path(),
            &[
                ("AWS_ROLE_ARN", "arn:aws:iam::123456789012:role/app"),
                ("AWS_WEB_IDENTITY_TOKEN_FILE", token.to_str().unwrap()),
                ("AWS_REGION", "us-east-1"),
            ],
            || assert!(AwsFetcher::new(FetchMode::Auto).uses_api()),
        );
    }

    #[test]
    fn test_auto_mode_with_container_credentials() {
        let home = tempfile::tempdir().unwrap();
        with_env(
            home.path(),
            &[("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/v2/credentials/abc")],
            || assert!(AwsFetcher::new(FetchMode::Auto).uses_api()),
        );
    }

    #[test]
    fn test_auto_mode_with_shared_credentials_file() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join(".aws")).unwrap();
        std::fs::write(
            home.path().join(".aws").join("credentials"),
            "[default]\naws_access_key_id = AKIDEXAMPLE\n",
        )
        .unwrap();
        with_env(home.path(), &[], || {
            assert!(AwsFetcher::new(FetchMode::Auto).uses_api());
        });
    }

    #[test]
    fn test_auto_mode_without_credentials() {
        let home = tempfile::tempdir().unwrap();
        with_env(home.path(), &[], || {
            assert!(!AwsFetcher::new(FetchMode::Auto).uses_api());
        });
    }

    #[test]
    fn test_default_mode_uses_sdk_chain_without_env() {
        let home = tempfile::tempdir().unwrap();
        with_env(home.path(), &[], || assert!(AwsFetcher::default().uses_api()));
    }

    #[test]
    fn test_auto_mode_with_injected_config() {
        let home = tempfile::tempdir().unwrap();
        with_env(home.path(), &[], || {
            let fetcher = AwsFetcher::builder()
                .mode(FetchMode::Auto)
                .sdk_config(SdkConfig::builder().build())
                .build();
            assert!(fetcher.uses_api());
        });
    }

    #[test]
    fn test_fetcher_debug() {
        let fetcher = AwsFetcher::builder()
            .mode(FetchMode::Cli)
            .region("eu-west-1")
            .build();
        let debug = format!("{fetcher:?}");
        assert!(debug.contains("AwsFetcher"));
        assert!(debug.contains("cli"));
        assert!(debug.contains("eu-west-1"));
    }

    #[tokio::test]
    async fn test_missing_region_is_client_config_error() {
        let fetcher = AwsFetcher::builder()
            .mode(FetchMode::Api)
            .sdk_config(SdkConfig::builder().build())
            .build();
        let err = fetcher
            .fetch(&FetchContext::new(), "prod/db")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SecretError::ClientConfig {
                provider: Provider::Aws,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_client_config_error() {
        let fetcher = AwsFetcher::builder()
            .mode(FetchMode::Api)
            .region("us-east-1")
            .sdk_config(SdkConfig::builder().build())
            .build();
        let err = fetcher
            .fetch(&FetchContext::new(), "prod/db")
            .await
            .unwrap_err();
        match err {
            SecretError::ClientConfig { message, .. } => assert!(message.contains("credentials")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
