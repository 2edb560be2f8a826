//! Google Cloud integration for cleanenv
//!
//! This crate provides the Secret Manager fetcher for the cleanenv populator.
//! Currently supports:
//! - GCP Secret Manager via the [`secrets`] module

pub mod secrets;

// Re-export main types for convenience
pub use secrets::{CREDENTIALS_ENV, GcpFetcher, GcpSecretRef, ParseSecretRefError};
