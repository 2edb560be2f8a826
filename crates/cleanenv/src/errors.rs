//! CLI error reporting with miette diagnostics and exit codes

use cleanenv::{FetchFailure, Provider, SecretError};
use miette::Diagnostic;
use thiserror::Error;

/// Exit code for bad configuration or input
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a failed or interrupted fetch
pub const EXIT_FETCH: i32 = 3;

/// CLI-specific error types with diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Tracing initialization failed: {message}")]
    #[diagnostic(
        code(cleanenv::cli::tracing_error),
        help("Check RUST_LOG and the --level/--format flags")
    )]
    Tracing { message: String },

    #[error("Configuration could not be loaded")]
    #[diagnostic(code(cleanenv::cli::config_error))]
    Config {
        #[source]
        source: SecretError,
        #[help]
        help_text: Option<String>,
    },

    #[error("Secret fetch failed")]
    #[diagnostic(code(cleanenv::cli::fetch_error))]
    Fetch {
        #[source]
        source: SecretError,
        #[help]
        help_text: Option<String>,
    },
}

impl CliError {
    /// Classify a population failure by its innermost cause
    pub fn from_secret_error(source: SecretError) -> Self {
        let help_text = help_for(source.root());
        let is_config = matches!(
            source.root(),
            SecretError::InvalidInput { .. }
                | SecretError::TypeMismatch { .. }
                | SecretError::ClientConfig { .. }
        );
        if is_config {
            Self::Config { source, help_text }
        } else {
            Self::Fetch { source, help_text }
        }
    }

    /// Process exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Tracing { .. } | Self::Config { .. } => EXIT_CONFIG,
            Self::Fetch { .. } => EXIT_FETCH,
        }
    }
}

fn help_for(root: &SecretError) -> Option<String> {
    let help = match root {
        SecretError::TypeMismatch { .. } => "Annotated fields must be String or SecretString",
        SecretError::ClientInit {
            provider: Provider::Gcp,
            ..
        } => {
            "Point GOOGLE_APPLICATION_CREDENTIALS at a service account key, run on GCP, or use --gcp-mode cli"
        }
        SecretError::ClientInit {
            provider: Provider::Aws,
            ..
        } => "Set AWS credentials (or AWS_PROFILE), or install the aws CLI",
        SecretError::ClientConfig {
            provider: Provider::Aws,
            ..
        } => "Set AWS_REGION (or --aws-region) and make credentials available",
        SecretError::Fetch {
            failure: FetchFailure::DeadlineExceeded,
            ..
        } => "Raise --timeout if the secret stores are slow to answer",
        SecretError::Fetch {
            failure: FetchFailure::Cancelled,
            ..
        } => "The run was interrupted before every secret was fetched",
        _ => return None,
    };
    Some(help.to_string())
}
