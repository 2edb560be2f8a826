//! Reference binary: loads an example configuration from both secret stores
//!
//! The secret identifiers below are placeholders; point them at secrets the
//! running identity can read before expecting a successful run.

mod cli;
mod errors;
mod logging;

use crate::cli::Cli;
use crate::errors::CliError;
use clap::Parser;
use cleanenv::{FetchContext, SecretConfig, SecretLoader};
use std::fmt::Write as _;
use tracing::instrument;

/// Example application configuration
#[derive(Debug, Default, SecretConfig)]
struct AppConfig {
    #[secret(gcp = "projects/your-gcp-project-id/secrets/your-api-key-secret/versions/latest")]
    api_key_gcp: String,
    #[secret(aws = "your/db/password_secret_name_or_arn")]
    db_password_aws: String,
    #[secret(aws = "another/aws/secret")]
    api_token_aws: String,
    /// Never fetched; keeps its local value
    regular_value: String,
    /// Empty annotation, so population leaves it alone
    #[secret(gcp = "")]
    unused_secret: String,
}

impl AppConfig {
    fn with_local_defaults() -> Self {
        Self {
            regular_value: "Default Local Value".to_string(),
            ..Self::default()
        }
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(&cli).await {
        let code = error.exit_code();
        eprintln!("{:?}", miette::Report::new(error));
        std::process::exit(code);
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    logging::init_tracing(&cli.tracing_config())?;

    let ctx = FetchContext::with_timeout(cli.timeout());
    cancel_on_interrupt(&ctx);

    let config = load(&cli.loader(), &ctx).await?;
    print_config(&render(&config, cli.reveal));
    Ok(())
}

/// Cancel `ctx` on Ctrl-C so in-flight requests are abandoned
fn cancel_on_interrupt(ctx: &FetchContext) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding secret fetches");
            ctx.cancel();
        }
    });
}

#[instrument(skip_all, fields(correlation_id = %logging::correlation_id()))]
async fn load(loader: &SecretLoader, ctx: &FetchContext) -> Result<AppConfig, CliError> {
    let mut config = AppConfig::with_local_defaults();
    tracing::info!("Loading configuration from secrets");
    loader
        .populate(ctx, &mut config)
        .await
        .map_err(CliError::from_secret_error)?;
    Ok(config)
}

/// Secret values are shown as their length unless `reveal` is set
fn masked(value: &str, reveal: bool) -> String {
    if reveal {
        value.to_string()
    } else {
        format!("<{} chars>", value.chars().count())
    }
}

fn render(config: &AppConfig, reveal: bool) -> String {
    let mut out = String::from("Successfully loaded configuration:\n");
    let _ = writeln!(out, "  API Key (GCP): {}", masked(&config.api_key_gcp, reveal));
    let _ = writeln!(
        out,
        "  DB Password (AWS): {}",
        masked(&config.db_password_aws, reveal)
    );
    let _ = writeln!(out, "  API Token (AWS): {}", masked(&config.api_token_aws, reveal));
    let _ = writeln!(out, "  Regular Value: {}", config.regular_value);
    let _ = writeln!(out, "  Unused Secret Field: '{}'", config.unused_secret);
    out
}

#[allow(clippy::print_stdout)]
fn print_config(rendered: &str) {
    print!("{rendered}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleanenv_secrets::testing::StaticFetcher;
    use cleanenv::{Provider, SecretError, SecretFields};
    use std::sync::Arc;
    use std::time::Duration;

    const GCP_KEY: &str =
        "projects/your-gcp-project-id/secrets/your-api-key-secret/versions/latest";
    const AWS_DB: &str = "your/db/password_secret_name_or_arn";
    const AWS_TOKEN: &str = "another/aws/secret";

    fn loader(gcp: StaticFetcher, aws: StaticFetcher) -> SecretLoader {
        SecretLoader::new(Arc::new(gcp), Arc::new(aws))
    }

    fn populated() -> AppConfig {
        AppConfig {
            api_key_gcp: "secretA".to_string(),
            db_password_aws: "secretB".to_string(),
            api_token_aws: "token".to_string(),
            ..AppConfig::with_local_defaults()
        }
    }

    #[test]
    fn test_manifest_skips_unannotated_and_opted_out() {
        let mut config = AppConfig::with_local_defaults();
        let fields = config.secret_fields();
        let names: Vec<_> = fields.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            ["api_key_gcp", "db_password_aws", "api_token_aws", "unused_secret"]
        );
        assert!(fields[3].source().is_none());
    }

    #[tokio::test]
    async fn test_load_populates_all_secrets() {
        let loader = loader(
            StaticFetcher::new(Provider::Gcp).with_secret(GCP_KEY, "secretA"),
            StaticFetcher::new(Provider::Aws)
                .with_secret(AWS_DB, "secretB")
                .with_secret(AWS_TOKEN, "token"),
        );

        let config = load(&loader, &FetchContext::new()).await.unwrap();
        assert_eq!(config.api_key_gcp, "secretA");
        assert_eq!(config.db_password_aws, "secretB");
        assert_eq!(config.api_token_aws, "token");
        assert_eq!(config.regular_value, "Default Local Value");
        assert_eq!(config.unused_secret, "");
    }

    #[tokio::test]
    async fn test_load_failure_maps_to_fetch_exit_code() {
        let loader = loader(
            StaticFetcher::new(Provider::Gcp).with_secret(GCP_KEY, "secretA"),
            StaticFetcher::new(Provider::Aws).with_secret(AWS_DB, "secretB"),
        );

        let err = load(&loader, &FetchContext::new()).await.unwrap_err();
        assert_eq!(err.exit_code(), errors::EXIT_FETCH);
        match err {
            CliError::Fetch { source, .. } => {
                assert_eq!(source.field(), Some("api_token_aws"));
                assert!(matches!(source.root(), SecretError::Fetch { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_times_out() {
        let loader = loader(
            StaticFetcher::new(Provider::Gcp)
                .with_secret(GCP_KEY, "secretA")
                .with_delay(Duration::from_secs(120)),
            StaticFetcher::new(Provider::Aws),
        );

        let ctx = FetchContext::with_timeout(Duration::from_secs(60));
        let err = load(&loader, &ctx).await.unwrap_err();
        match err {
            CliError::Fetch { source, .. } => assert!(source.is_cancelled()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_render_masks_secrets() {
        let out = render(&populated(), false);
        assert!(out.contains("API Key (GCP): <7 chars>"));
        assert!(out.contains("DB Password (AWS): <7 chars>"));
        assert!(out.contains("API Token (AWS): <5 chars>"));
        assert!(out.contains("Regular Value: Default Local Value"));
        assert!(out.contains("Unused Secret Field: ''"));
        assert!(!out.contains("secretA"));
    }

    #[test]
    fn test_render_reveal() {
        let out = render(&populated(), true);
        assert!(out.contains("API Key (GCP): secretA"));
        assert!(out.contains("DB Password (AWS): secretB"));
    }
}
