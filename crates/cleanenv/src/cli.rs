use crate::logging::{LogLevel, TracingConfig, TracingFormat};
use clap::Parser;
use cleanenv::{AwsFetcher, FetchMode, GcpFetcher, SecretLoader};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "cleanenv")]
#[command(about = "Load the example application configuration from GCP and AWS secret stores")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        env = "CLEANENV_TIMEOUT",
        default_value_t = 60,
        help = "Seconds before outstanding fetches are abandoned"
    )]
    pub timeout: u64,

    #[arg(
        short = 'L',
        long,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, help = "Log output format", default_value = "compact", value_enum)]
    pub format: TracingFormat,

    #[arg(
        long,
        env = "CLEANENV_LOG",
        help = "Tracing filter directives; overrides --level and RUST_LOG"
    )]
    pub log_filter: Option<String>,

    #[arg(
        long,
        env = "CLEANENV_GCP_MODE",
        default_value = "api",
        help = "How to reach GCP Secret Manager (auto, api, cli)"
    )]
    pub gcp_mode: FetchMode,

    #[arg(
        long,
        env = "CLEANENV_AWS_MODE",
        default_value = "api",
        help = "How to reach AWS Secrets Manager (auto, api, cli)"
    )]
    pub aws_mode: FetchMode,

    #[arg(long, env = "CLEANENV_AWS_REGION", help = "AWS region override")]
    pub aws_region: Option<String>,

    #[arg(
        long,
        env = "CLEANENV_AWS_ENDPOINT",
        help = "Custom AWS Secrets Manager endpoint (e.g. LocalStack)"
    )]
    pub aws_endpoint: Option<String>,

    #[arg(long, help = "Print secret values instead of their lengths")]
    pub reveal: bool,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            format: self.format,
            level: self.level.into(),
            filter: self.log_filter.clone(),
        }
    }

    /// Build the loader from the mode and AWS override flags
    pub fn loader(&self) -> SecretLoader {
        let mut aws = AwsFetcher::builder().mode(self.aws_mode);
        if let Some(region) = &self.aws_region {
            aws = aws.region(region.clone());
        }
        if let Some(endpoint) = &self.aws_endpoint {
            aws = aws.endpoint_url(endpoint.clone());
        }
        cleanenv::loader(GcpFetcher::new(self.gcp_mode), aws.build())
    }
}
