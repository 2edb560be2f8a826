//! AWS integration for cleanenv
//!
//! This crate provides the Secrets Manager fetcher for the cleanenv populator.
//! Currently supports:
//! - AWS Secrets Manager via the [`secrets`] module

pub mod secrets;

// Re-export main types for convenience
pub use secrets::{AwsFetcher, AwsFetcherBuilder};
