//! Shared value types
//!
//! - [`SecureSecret`]: a fetched secret value that zeroes on drop and never prints
//! - [`Provider`]: the two supported secret stores
//! - [`FetchMode`]: how an adapter reaches its provider

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// A fetched secret value with automatic memory zeroing on drop.
///
/// This type wraps `secrecy::SecretString` to ensure:
/// - Secret values are zeroed from memory when dropped
/// - Debug output shows `[REDACTED]` instead of the actual value
/// - Explicit `.expose()` call required to access the value
#[derive(Clone)]
pub struct SecureSecret {
    inner: SecretString,
}

impl SecureSecret {
    /// Create a new secure secret from a string.
    #[must_use]
    pub fn new(value: String) -> Self {
        Self {
            inner: SecretString::from(value),
        }
    }

    /// Expose the secret value for use.
    ///
    /// The caller must not log or persist the exposed value.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Get the length of the secret value without exposing it.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Check if the secret value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }

    /// Convert into the underlying `SecretString` without copying out the value.
    #[must_use]
    pub fn into_secret_string(self) -> SecretString {
        self.inner
    }
}

impl From<String> for SecureSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureSecret {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl std::fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Secret stores a field can be annotated with, in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Cloud Secret Manager, identified by a secret version resource path
    Gcp,
    /// AWS Secrets Manager, identified by a secret name or ARN
    Aws,
}

impl Provider {
    /// Providers in the order the populator consults a field's annotations.
    pub const PRIORITY: [Self; 2] = [Self::Gcp, Self::Aws];

    /// Short provider name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gcp => "gcp",
            Self::Aws => "aws",
        }
    }

    /// Annotation key that selects this provider on a field.
    #[must_use]
    pub const fn annotation(self) -> &'static str {
        match self {
            Self::Gcp => "gcp_secret",
            Self::Aws => "aws_secret",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider adapter reaches its secret store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Use the API when the environment shows signs of SDK credentials, the CLI otherwise
    Auto,
    /// Always use the provider SDK/API and its default credential chain
    #[default]
    Api,
    /// Always shell out to the provider CLI
    Cli,
}

impl std::str::FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "api" | "http" => Ok(Self::Api),
            "cli" => Ok(Self::Cli),
            _ => Err(format!("Unknown fetch mode: {s}")),
        }
    }
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Api => "api",
            Self::Cli => "cli",
        })
    }
}
