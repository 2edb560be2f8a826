//! GCP Secret Manager fetcher with auto-negotiating dual-mode (API + CLI)

use async_trait::async_trait;
use cleanenv_secrets::{FetchMode, Provider, SecretError, SecretFetcher, SecureSecret};
use google_secretmanager1::{SecretManager, hyper_rustls, hyper_util, yup_oauth2};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tokio::process::Command;

type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Environment variable naming a service account key file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Hardware product name exposed by Compute Engine and GKE nodes
const PRODUCT_NAME_PATH: &str = "/sys/class/dmi/id/product_name";

/// A parsed secret version resource path
/// (`projects/PROJECT/secrets/SECRET/versions/VERSION`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpSecretRef {
    /// GCP project ID or number
    pub project: String,

    /// Secret name
    pub secret: String,

    /// Version number or alias such as "latest"
    pub version: String,
}

impl GcpSecretRef {
    /// Reference the latest version of `secret` in `project`
    #[must_use]
    pub fn latest(project: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            secret: secret.into(),
            version: "latest".to_string(),
        }
    }

    /// Get the full resource name for the secret version
    #[must_use]
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project, self.secret, self.version
        )
    }
}

impl std::fmt::Display for GcpSecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.resource_name())
    }
}

/// A resource path that is not `projects/P/secrets/S/versions/V`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected projects/PROJECT/secrets/SECRET/versions/VERSION, got '{0}'")]
pub struct ParseSecretRefError(String);

impl FromStr for GcpSecretRef {
    type Err = ParseSecretRefError;

    fn from_str(resource_name: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = resource_name.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "secrets", secret, "versions", version]
                if !project.is_empty() && !secret.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    project: (*project).to_string(),
                    secret: (*secret).to_string(),
                    version: (*version).to_string(),
                })
            }
            _ => Err(ParseSecretRefError(resource_name.to_string())),
        }
    }
}

/// Fetches secrets from GCP Secret Manager
///
/// The default [`FetchMode::Api`] authenticates with application default
/// credentials: the service account key named by
/// `GOOGLE_APPLICATION_CREDENTIALS`, or the metadata server when that is
/// unset. [`FetchMode::Auto`] picks the API when either source looks usable
/// (the variable is set, or the process runs on GCP) and the `gcloud` CLI
/// otherwise.
///
/// API mode builds a client per call and drops it when the call returns.
/// Identifiers are secret version resource paths; CLI mode additionally
/// requires them to parse as a [`GcpSecretRef`].
pub struct GcpFetcher {
    use_api: bool,
    base_url: Option<String>,
}

impl std::fmt::Debug for GcpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpFetcher")
            .field("mode", &self.mode_name())
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for GcpFetcher {
    fn default() -> Self {
        Self::new(FetchMode::default())
    }
}

impl GcpFetcher {
    /// Create a fetcher using `mode`; [`FetchMode::Auto`] is resolved now.
    #[must_use]
    pub fn new(mode: FetchMode) -> Self {
        let use_api = match mode {
            FetchMode::Api => true,
            FetchMode::Cli => false,
            FetchMode::Auto => Self::api_credentials_available(),
        };
        if !use_api {
            tracing::debug!("No GCP credential source found, using gcloud CLI");
        }
        Self {
            use_api,
            base_url: None,
        }
    }

    /// Send API requests to `base_url` (e.g. `http://localhost:8080/`)
    /// instead of `https://secretmanager.googleapis.com/`
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Check if application default credentials have a source to use
    fn api_credentials_available() -> bool {
        std::env::var_os(CREDENTIALS_ENV).is_some() || on_gcp()
    }

    /// Whether requests go through the Secret Manager API
    #[must_use]
    pub const fn uses_api(&self) -> bool {
        self.use_api
    }

    const fn mode_name(&self) -> &'static str {
        if self.use_api { "api" } else { "cli" }
    }

    /// Build a Secret Manager hub scoped to one call
    async fn hub(&self, identifier: &str) -> Result<SecretManager<HttpsConnector>, SecretError> {
        let init_error = |message: String| SecretError::ClientInit {
            provider: Provider::Gcp,
            identifier: identifier.to_string(),
            message,
        };

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| init_error(format!("Failed to load native TLS roots: {e}")))?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(connector);

        // The key file is read here so a missing or malformed file surfaces
        // as an error instead of inside the authenticator builder.
        let auth = if let Some(path) = std::env::var_os(CREDENTIALS_ENV) {
            let key = yup_oauth2::read_service_account_key(&path)
                .await
                .map_err(|e| {
                    init_error(format!(
                        "Failed to read service account key {}: {e}",
                        Path::new(&path).display()
                    ))
                })?;
            yup_oauth2::ServiceAccountAuthenticator::builder(key)
                .build()
                .await
        } else {
            let opts = yup_oauth2::ApplicationDefaultCredentialsFlowOpts::default();
            match yup_oauth2::ApplicationDefaultCredentialsAuthenticator::builder(opts).await {
                yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes::InstanceMetadata(
                    builder,
                ) => builder.build().await,
                yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes::ServiceAccount(
                    builder,
                ) => builder.build().await,
            }
        }
        .map_err(|e| init_error(format!("Failed to load application default credentials: {e}")))?;

        let mut hub = SecretManager::new(client, auth);
        if let Some(base_url) = &self.base_url {
            hub.base_url(base_url.clone());
        }
        Ok(hub)
    }

    /// Fetch using the Secret Manager API
    async fn access_api(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        let hub = self.hub(identifier).await?;

        let (_, response) = hub
            .projects()
            .secrets_versions_access(identifier)
            .doit()
            .await
            .map_err(|e| {
                SecretError::fetch(
                    Provider::Gcp,
                    identifier,
                    format!("Secret Manager error: {e}"),
                )
            })?;

        let data = response
            .payload
            .and_then(|payload| payload.data)
            .ok_or_else(|| empty_secret(identifier))?;
        decode_payload(identifier, data)
    }

    /// Fetch using the gcloud CLI
    async fn access_cli(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        let secret_ref = identifier
            .parse::<GcpSecretRef>()
            .map_err(|e| SecretError::fetch(Provider::Gcp, identifier, e.to_string()))?;

        let output = Command::new("gcloud")
            .args([
                "secrets",
                "versions",
                "access",
                &secret_ref.version,
                "--secret",
                &secret_ref.secret,
                "--project",
                &secret_ref.project,
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SecretError::ClientInit {
                provider: Provider::Gcp,
                identifier: identifier.to_string(),
                message: format!("Failed to execute gcloud CLI: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SecretError::fetch(
                Provider::Gcp,
                identifier,
                format!("gcloud CLI failed: {}", stderr.trim()),
            ));
        }

        decode_payload(identifier, output.stdout)
    }
}

#[async_trait]
impl SecretFetcher for GcpFetcher {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn access(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        tracing::debug!(
            identifier,
            mode = self.mode_name(),
            "Accessing GCP secret version"
        );
        if self.use_api {
            return self.access_api(identifier).await;
        }
        self.access_cli(identifier).await
    }
}

/// Whether the process runs where the metadata server can hand out tokens
fn on_gcp() -> bool {
    std::env::var_os("GCE_METADATA_HOST").is_some()
        || std::env::var_os("K_SERVICE").is_some()
        || google_hardware()
}

fn google_hardware() -> bool {
    std::fs::read_to_string(PRODUCT_NAME_PATH)
        .is_ok_and(|name| name.trim_start().starts_with("Google"))
}

fn empty_secret(identifier: &str) -> SecretError {
    SecretError::EmptyOrUnsupported {
        provider: Provider::Gcp,
        identifier: identifier.to_string(),
    }
}

/// Decode a payload as UTF-8 text; binary payloads are unsupported
fn decode_payload(identifier: &str, data: Vec<u8>) -> Result<SecureSecret, SecretError> {
    String::from_utf8(data)
        .map(SecureSecret::new)
        .map_err(|_| empty_secret(identifier))
}
