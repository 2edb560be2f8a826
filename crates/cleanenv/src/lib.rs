//! Populate configuration structs from cloud secret stores
//!
//! `cleanenv` fills the text fields of a caller-owned struct from Google Cloud
//! Secret Manager and AWS Secrets Manager. Each field says where its value
//! lives with a `#[secret(...)]` annotation:
//!
//! ```ignore
//! use cleanenv::{FetchContext, SecretConfig};
//! use std::time::Duration;
//!
//! #[derive(SecretConfig)]
//! struct AppConfig {
//!     #[secret(gcp = "projects/my-project/secrets/api-key/versions/latest")]
//!     api_key: String,
//!     #[secret(aws = "prod/db-password")]
//!     db_password: String,
//!     log_level: String,
//! }
//!
//! let mut config = AppConfig {
//!     api_key: String::new(),
//!     db_password: String::new(),
//!     log_level: "info".into(),
//! };
//! let ctx = FetchContext::with_timeout(Duration::from_secs(60));
//! cleanenv::load_config_from_secrets(&ctx, &mut config).await?;
//! ```
//!
//! When a field carries both annotations, GCP wins. Fields are fetched one at
//! a time in declaration order and the first failure stops population;
//! fields already written keep their new values.

// The derive expands to `::cleanenv::...`, which must also resolve in here.
extern crate self as cleanenv;

pub use cleanenv_aws::{AwsFetcher, AwsFetcherBuilder};
pub use cleanenv_derive::SecretConfig;
pub use cleanenv_gcp::{GcpFetcher, GcpSecretRef, ParseSecretRefError};
pub use cleanenv_secrets::{
    FetchContext, FetchFailure, FetchMode, Provider, SecretError, SecretFetcher, SecretField,
    SecretFields, SecretLoader, SecureSecret,
};
pub use secrecy::{ExposeSecret, SecretString};

#[cfg(feature = "testing")]
pub use cleanenv_secrets::testing;

use std::sync::Arc;

/// Loader using both real adapters in [`FetchMode::Api`], so credentials come
/// from each SDK's default chain
#[must_use]
pub fn default_loader() -> SecretLoader {
    loader(GcpFetcher::new(FetchMode::Api), AwsFetcher::new(FetchMode::Api))
}

/// Loader over the given adapters
#[must_use]
pub fn loader(gcp: GcpFetcher, aws: AwsFetcher) -> SecretLoader {
    SecretLoader::new(Arc::new(gcp), Arc::new(aws))
}

/// Populate `target` using [`default_loader`]
///
/// # Errors
///
/// Returns the first [`SecretError`] hit while walking the annotated fields.
/// Fields populated before the failure keep their fetched values.
pub async fn load_config_from_secrets<T>(
    ctx: &FetchContext,
    target: &mut T,
) -> Result<(), SecretError>
where
    T: SecretFields + ?Sized,
{
    default_loader().populate(ctx, target).await
}
