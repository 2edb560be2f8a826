//! Annotation-driven population of configuration structs

use crate::{FetchContext, Provider, SecretError, SecretField, SecretFetcher, SecretFields};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Populates [`SecretFields`] implementors from the two provider fetchers.
///
/// Fields are processed one at a time in declaration order. The first fetch
/// or type error aborts the run; fields already populated keep their new
/// values and later fields are never attempted.
#[derive(Clone)]
pub struct SecretLoader {
    gcp: Arc<dyn SecretFetcher>,
    aws: Arc<dyn SecretFetcher>,
}

impl SecretLoader {
    /// Create a loader from a Google Cloud fetcher and an AWS fetcher.
    #[must_use]
    pub fn new(gcp: Arc<dyn SecretFetcher>, aws: Arc<dyn SecretFetcher>) -> Self {
        Self { gcp, aws }
    }

    /// The fetcher used for `provider`.
    #[must_use]
    pub fn fetcher(&self, provider: Provider) -> &dyn SecretFetcher {
        match provider {
            Provider::Gcp => self.gcp.as_ref(),
            Provider::Aws => self.aws.as_ref(),
        }
    }

    /// Populate every annotated field of `target`.
    ///
    /// # Errors
    ///
    /// - `SecretError::InvalidInput` if the field manifest is malformed; no
    ///   field is touched.
    /// - `SecretError::TypeMismatch` if an annotated field is not text-typed;
    ///   no fetch is issued for it.
    /// - `SecretError::Field` wrapping the fetch failure of the first field
    ///   that could not be populated.
    #[instrument(skip_all, fields(target = std::any::type_name::<T>()))]
    pub async fn populate<T>(&self, ctx: &FetchContext, target: &mut T) -> Result<(), SecretError>
    where
        T: SecretFields + ?Sized,
    {
        let mut fields = target.secret_fields();
        validate(&fields)?;

        let mut populated = 0usize;
        for field in &mut fields {
            if !field.is_writable() {
                tracing::debug!(field = field.name(), "Skipping read-only field");
                continue;
            }
            let Some((provider, identifier)) = field.source() else {
                tracing::trace!(field = field.name(), "No secret annotation");
                continue;
            };
            let identifier = identifier.to_string();

            if !field.is_text() {
                return Err(field.type_mismatch(provider, &identifier));
            }

            tracing::debug!(
                field = field.name(),
                provider = %provider,
                identifier = %identifier,
                "Fetching secret"
            );
            let value = self
                .fetcher(provider)
                .fetch(ctx, &identifier)
                .await
                .map_err(|e| SecretError::Field {
                    field: field.name().to_string(),
                    provider,
                    identifier: identifier.clone(),
                    source: Box::new(e),
                })?;

            field.assign(value)?;
            populated += 1;
        }

        tracing::info!(
            populated,
            fields = fields.len(),
            "Configuration populated from secrets"
        );
        Ok(())
    }
}

impl std::fmt::Debug for SecretLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretLoader")
            .field("gcp", &self.gcp.provider())
            .field("aws", &self.aws.provider())
            .finish()
    }
}

fn validate(fields: &[SecretField<'_>]) -> Result<(), SecretError> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if field.name().is_empty() {
            return Err(SecretError::InvalidInput {
                message: "secret field with an empty name".to_string(),
            });
        }
        if !seen.insert(field.name()) {
            return Err(SecretError::InvalidInput {
                message: format!("secret field '{}' is listed more than once", field.name()),
            });
        }
    }
    Ok(())
}
