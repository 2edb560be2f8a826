//! Field manifest for secret population
//!
//! A struct exposes its secret-backed fields as an ordered list of
//! [`SecretField`]s. Each entry pairs the field's name and annotations with a
//! type-erased mutable slot, so the populator can check the declared type
//! before fetching and assign the value afterwards.

use crate::{Provider, SecretError, SecureSecret};
use secrecy::SecretString;
use std::any::Any;

/// Types whose secret-backed fields can be populated.
///
/// Usually derived with `#[derive(SecretConfig)]`; a manual implementation
/// lists the annotated fields in declaration order:
///
/// ```ignore
/// impl SecretFields for AppConfig {
///     fn secret_fields(&mut self) -> Vec<SecretField<'_>> {
///         vec![
///             SecretField::new("api_key", &mut self.api_key)
///                 .gcp("projects/p/secrets/api-key/versions/latest"),
///             SecretField::new("db_password", &mut self.db_password).aws("prod/db"),
///         ]
///     }
/// }
/// ```
pub trait SecretFields {
    /// Annotated fields in declaration order.
    fn secret_fields(&mut self) -> Vec<SecretField<'_>>;
}

/// One annotated field of a configuration struct.
pub struct SecretField<'a> {
    name: &'static str,
    type_name: &'static str,
    gcp: Option<String>,
    aws: Option<String>,
    writable: bool,
    slot: &'a mut (dyn Any + Send),
}

impl<'a> SecretField<'a> {
    /// Describe field `name` backed by `value`.
    pub fn new<T: Any + Send>(name: &'static str, value: &'a mut T) -> Self {
        Self {
            name,
            type_name: std::any::type_name::<T>(),
            gcp: None,
            aws: None,
            writable: true,
            slot: value,
        }
    }

    /// Annotate with a Google Cloud secret version resource path.
    #[must_use]
    pub fn gcp(mut self, resource_path: impl Into<String>) -> Self {
        self.gcp = Some(resource_path.into());
        self
    }

    /// Annotate with an AWS secret name or ARN.
    #[must_use]
    pub fn aws(mut self, secret_id: impl Into<String>) -> Self {
        self.aws = Some(secret_id.into());
        self
    }

    /// Mark the field as not writable by the populator; it is skipped.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Field name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type of the field.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the populator may write to this field.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Raw annotation value for `provider`, including empty opt-out values.
    #[must_use]
    pub fn annotation(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Gcp => self.gcp.as_deref(),
            Provider::Aws => self.aws.as_deref(),
        }
    }

    /// The provider and identifier that apply to this field.
    ///
    /// Providers are consulted in [`Provider::PRIORITY`] order. An empty
    /// annotation counts as absent.
    #[must_use]
    pub fn source(&self) -> Option<(Provider, &str)> {
        Provider::PRIORITY.into_iter().find_map(|provider| {
            self.annotation(provider)
                .filter(|identifier| !identifier.is_empty())
                .map(|identifier| (provider, identifier))
        })
    }

    /// Whether the field's type can hold a secret value.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.slot.is::<String>() || self.slot.is::<SecretString>()
    }

    /// The error reported when this field cannot hold the secret named by
    /// `provider` and `identifier`.
    #[must_use]
    pub fn type_mismatch(&self, provider: Provider, identifier: &str) -> SecretError {
        SecretError::TypeMismatch {
            field: self.name.to_string(),
            provider,
            identifier: identifier.to_string(),
            found: self.type_name,
        }
    }

    /// Store `value` in the field.
    ///
    /// # Errors
    ///
    /// Leaves the field untouched and returns `SecretError::TypeMismatch`
    /// when the field is not text-typed, or `SecretError::InvalidInput` when
    /// it is also unannotated.
    pub fn assign(&mut self, value: SecureSecret) -> Result<(), SecretError> {
        if let Some(text) = self.slot.downcast_mut::<String>() {
            *text = value.expose().to_string();
            return Ok(());
        }
        if let Some(secret) = self.slot.downcast_mut::<SecretString>() {
            *secret = value.into_secret_string();
            return Ok(());
        }
        Err(match self.source() {
            Some((provider, identifier)) => self.type_mismatch(provider, identifier),
            None => SecretError::InvalidInput {
                message: format!(
                    "field '{}' of type {} cannot hold a secret",
                    self.name, self.type_name
                ),
            },
        })
    }
}

impl std::fmt::Debug for SecretField<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretField")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("gcp", &self.gcp)
            .field("aws", &self.aws)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}
