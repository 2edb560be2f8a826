//! In-memory fetchers for tests
//!
//! Enabled by the `testing` feature. [`StaticFetcher`] serves secrets from a
//! map and records every identifier it is asked for.

use crate::{Provider, SecretError, SecretFetcher, SecureSecret};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Map-backed fetcher that records each `access` call.
///
/// Unknown identifiers fail with a provider `FetchError`, as a missing secret
/// would.
#[derive(Debug)]
pub struct StaticFetcher {
    provider: Provider,
    secrets: HashMap<String, String>,
    failures: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Create an empty fetcher for `provider`.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            secrets: HashMap::new(),
            failures: HashMap::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `value` for `identifier`.
    #[must_use]
    pub fn with_secret(mut self, identifier: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(identifier.into(), value.into());
        self
    }

    /// Fail requests for `identifier` with `message`.
    #[must_use]
    pub fn with_failure(
        mut self,
        identifier: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.failures.insert(identifier.into(), message.into());
        self
    }

    /// Sleep for `delay` before answering, to exercise deadlines.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Identifiers requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SecretFetcher for StaticFetcher {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn access(&self, identifier: &str) -> Result<SecureSecret, SecretError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(identifier.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failures.get(identifier) {
            return Err(SecretError::fetch(self.provider, identifier, message.clone()));
        }
        self.secrets
            .get(identifier)
            .map(|value| SecureSecret::new(value.clone()))
            .ok_or_else(|| SecretError::fetch(self.provider, identifier, "secret not found"))
    }
}
