//! Secret-backed configuration population for cleanenv
//!
//! Populates fields of a caller-owned configuration struct from two secret
//! stores: Google Cloud Secret Manager and AWS Secrets Manager. Each field
//! names its source through a per-field annotation, collected at compile time
//! into a [`SecretField`] manifest (usually by `#[derive(SecretConfig)]`).
//!
//! # Population
//!
//! ```ignore
//! use cleanenv_secrets::{FetchContext, SecretLoader};
//! use std::time::Duration;
//!
//! let loader = SecretLoader::new(gcp_fetcher, aws_fetcher);
//! let ctx = FetchContext::with_timeout(Duration::from_secs(60));
//!
//! // Fields are visited in declaration order; the first failure aborts.
//! loader.populate(&ctx, &mut config).await?;
//! ```
//!
//! Provider adapters live in separate crates:
//! - cleanenv-gcp: `GcpFetcher`
//! - cleanenv-aws: `AwsFetcher`

mod context;
mod fields;
mod populate;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;

pub use context::FetchContext;
pub use fields::{SecretField, SecretFields};
pub use populate::SecretLoader;
pub use types::{FetchMode, Provider, SecureSecret};

use async_trait::async_trait;
use thiserror::Error;

/// Why a provider request did not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    /// The provider rejected or failed the request (not found, denied, network)
    Provider,
    /// The execution context was cancelled
    Cancelled,
    /// The execution context's deadline elapsed
    DeadlineExceeded,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Provider => "provider error",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline exceeded",
        })
    }
}

/// Error types for secret population
#[derive(Debug, Error)]
pub enum SecretError {
    /// The population target is malformed
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What is wrong with the input
        message: String,
    },

    /// The provider client could not be constructed
    #[error("Failed to create {provider} secret client for '{identifier}': {message}")]
    ClientInit {
        /// Provider whose client failed
        provider: Provider,
        /// Secret identifier being fetched
        identifier: String,
        /// Error message from the client builder
        message: String,
    },

    /// Ambient provider configuration could not be resolved
    #[error("Failed to load {provider} configuration for '{identifier}': {message}")]
    ClientConfig {
        /// Provider whose configuration failed
        provider: Provider,
        /// Secret identifier being fetched
        identifier: String,
        /// Error message from configuration discovery
        message: String,
    },

    /// The provider request failed
    #[error("Failed to fetch {provider} secret '{identifier}' ({failure}): {message}")]
    Fetch {
        /// Provider that was queried
        provider: Provider,
        /// Secret identifier being fetched
        identifier: String,
        /// Failure classification
        failure: FetchFailure,
        /// Error message from the provider
        message: String,
    },

    /// The provider returned no usable string payload
    #[error("{provider} secret '{identifier}' value is empty or not a string")]
    EmptyOrUnsupported {
        /// Provider that was queried
        provider: Provider,
        /// Secret identifier that was fetched
        identifier: String,
    },

    /// An annotated field is not text-typed
    #[error(
        "Field '{field}' with tag '{}' ({identifier}) must be of type String, got {found}",
        provider.annotation()
    )]
    TypeMismatch {
        /// Field name
        field: String,
        /// Provider whose annotation was found
        provider: Provider,
        /// Secret identifier from the annotation
        identifier: String,
        /// Declared type of the field
        found: &'static str,
    },

    /// Populating a specific field failed
    #[error("Failed to load {provider} secret for field '{field}' ({identifier})")]
    Field {
        /// Field name
        field: String,
        /// Provider used for the field
        provider: Provider,
        /// Secret identifier from the annotation
        identifier: String,
        /// Underlying failure
        #[source]
        source: Box<Self>,
    },
}

impl SecretError {
    /// Create a provider-side fetch failure
    #[must_use]
    pub fn fetch(
        provider: Provider,
        identifier: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Fetch {
            provider,
            identifier: identifier.into(),
            failure: FetchFailure::Provider,
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`SecretError::Field`] wrappers
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Field { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure came from context cancellation or an elapsed deadline
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.root(),
            Self::Fetch {
                failure: FetchFailure::Cancelled | FetchFailure::DeadlineExceeded,
                ..
            }
        )
    }

    /// The field a [`SecretError::Field`] failure is attributed to
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Field { field, .. } | Self::TypeMismatch { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Fetches secret values from a single provider.
///
/// Implementors provide:
/// - [`access`](SecretFetcher::access) - One round trip to the provider
/// - [`provider`](SecretFetcher::provider) - Which provider this adapter talks to
///
/// [`fetch`](SecretFetcher::fetch) runs `access` under a [`FetchContext`] and
/// is what the populator calls.
#[async_trait]
pub trait SecretFetcher: Send + Sync {
    /// The provider this fetcher talks to.
    fn provider(&self) -> Provider;

    /// Fetch one secret by its provider-specific identifier, without
    /// cancellation or deadline handling.
    async fn access(&self, identifier: &str) -> Result<SecureSecret, SecretError>;

    /// Fetch one secret, honouring the context's cancellation and deadline.
    ///
    /// A context that is already cancelled fails without calling
    /// [`access`](SecretFetcher::access).
    async fn fetch(
        &self,
        ctx: &FetchContext,
        identifier: &str,
    ) -> Result<SecureSecret, SecretError> {
        ctx.run(self.provider(), identifier, self.access(identifier)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_error_fetch() {
        let err = SecretError::fetch(Provider::Gcp, "projects/p/secrets/s/versions/1", "denied");
        let msg = err.to_string();
        assert!(msg.contains("gcp"));
        assert!(msg.contains("projects/p/secrets/s/versions/1"));
        assert!(msg.contains("provider error"));
        assert!(msg.contains("denied"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_secret_error_empty_or_unsupported() {
        let err = SecretError::EmptyOrUnsupported {
            provider: Provider::Aws,
            identifier: "db/password".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "aws secret 'db/password' value is empty or not a string"
        );
    }

    #[test]
    fn test_secret_error_type_mismatch() {
        let err = SecretError::TypeMismatch {
            field: "port".to_string(),
            provider: Provider::Gcp,
            identifier: "projects/p/secrets/port/versions/1".to_string(),
            found: "u16",
        };
        let msg = err.to_string();
        assert!(msg.contains("port"));
        assert!(msg.contains("projects/p/secrets/port/versions/1"));
        assert!(msg.contains("gcp_secret"));
        assert!(msg.contains("u16"));
        assert_eq!(err.field(), Some("port"));
    }

    #[test]
    fn test_field_error_root_and_source() {
        use std::error::Error as _;

        let err = SecretError::Field {
            field: "api_key".to_string(),
            provider: Provider::Aws,
            identifier: "api/key".to_string(),
            source: Box::new(SecretError::Fetch {
                provider: Provider::Aws,
                identifier: "api/key".to_string(),
                failure: FetchFailure::Cancelled,
                message: "context cancelled".to_string(),
            }),
        };

        assert!(err.to_string().contains("api_key"));
        assert!(err.source().is_some());
        assert!(matches!(err.root(), SecretError::Fetch { .. }));
        assert!(err.is_cancelled());
        assert_eq!(err.field(), Some("api_key"));
    }

    #[test]
    fn test_fetch_failure_display() {
        assert_eq!(FetchFailure::Provider.to_string(), "provider error");
        assert_eq!(FetchFailure::Cancelled.to_string(), "cancelled");
        assert_eq!(
            FetchFailure::DeadlineExceeded.to_string(),
            "deadline exceeded"
        );
    }

    #[test]
    fn test_invalid_input_has_no_field() {
        let err = SecretError::InvalidInput {
            message: "duplicate field 'a'".to_string(),
        };
        assert!(err.field().is_none());
        assert!(err.to_string().starts_with("Invalid input"));
    }
}
