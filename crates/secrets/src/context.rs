//! Execution context for secret fetches
//!
//! A [`FetchContext`] carries a cancellation token and an optional deadline
//! shared by every fetch issued during one population run.

use crate::{FetchFailure, Provider, SecretError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline scope for secret fetches.
///
/// Cloning a context shares its cancellation state: cancelling any clone
/// cancels them all.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl FetchContext {
    /// Create a context with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context whose deadline is `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a deadline.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or_else(Self::new, Self::with_deadline)
    }

    /// Create a context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Create a context driven by an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context that is cancelled together with this one but can
    /// also be cancelled on its own. The deadline is inherited.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` when there is no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// A token sharing this context's cancellation state, for wiring signal
    /// handlers.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Drive one fetch for `identifier` under this context.
    ///
    /// Fails immediately, without polling `fetch`, when the context is already
    /// cancelled or past its deadline. Otherwise `fetch` races cancellation and
    /// the deadline; the losing future is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SecretError::Fetch` with [`FetchFailure::Cancelled`] or
    /// [`FetchFailure::DeadlineExceeded`], or whatever `fetch` returns.
    pub async fn run<T, F>(
        &self,
        provider: Provider,
        identifier: &str,
        fetch: F,
    ) -> Result<T, SecretError>
    where
        F: Future<Output = Result<T, SecretError>>,
    {
        if self.token.is_cancelled() {
            return Err(interrupted(provider, identifier, FetchFailure::Cancelled));
        }
        if self.remaining().is_some_and(|left| left.is_zero()) {
            return Err(interrupted(
                provider,
                identifier,
                FetchFailure::DeadlineExceeded,
            ));
        }

        let guarded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fetch)
                    .await
                    .unwrap_or_else(|_| {
                        Err(interrupted(
                            provider,
                            identifier,
                            FetchFailure::DeadlineExceeded,
                        ))
                    }),
                None => fetch.await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                tracing::debug!(provider = %provider, identifier, "Fetch cancelled");
                Err(interrupted(provider, identifier, FetchFailure::Cancelled))
            }
            result = guarded => result,
        }
    }
}

fn interrupted(provider: Provider, identifier: &str, failure: FetchFailure) -> SecretError {
    let message = match failure {
        FetchFailure::Cancelled => "context cancelled",
        FetchFailure::DeadlineExceeded => "context deadline exceeded",
        FetchFailure::Provider => "provider error",
    };
    SecretError::Fetch {
        provider,
        identifier: identifier.to_string(),
        failure,
        message: message.to_string(),
    }
}
