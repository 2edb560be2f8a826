//! Population through `#[derive(SecretConfig)]` against in-memory fetchers

#![allow(clippy::unwrap_used, clippy::expect_used)]

use cleanenv::{
    ExposeSecret, FetchContext, Provider, SecretConfig, SecretError, SecretFields, SecretLoader,
    SecretString,
};
use cleanenv_secrets::testing::StaticFetcher;
use std::sync::Arc;

const GCP_TOKEN: &str = "projects/p/secrets/token/versions/2";

type Loaded = (SecretLoader, Arc<StaticFetcher>, Arc<StaticFetcher>);

fn loader(gcp: StaticFetcher, aws: StaticFetcher) -> Loaded {
    let gcp = Arc::new(gcp);
    let aws = Arc::new(aws);
    (SecretLoader::new(gcp.clone(), aws.clone()), gcp, aws)
}

#[derive(SecretConfig)]
struct ServiceConfig {
    #[secret(gcp = "projects/p/secrets/token/versions/2", aws = "prod/token")]
    token: String,
    #[secret(aws = "prod/db")]
    db_password: SecretString,
    #[secret(aws = "prod/build", read_only)]
    build: String,
    #[secret(aws = "")]
    disabled: String,
    region: String,
}

impl ServiceConfig {
    fn new() -> Self {
        Self {
            token: String::new(),
            db_password: SecretString::from(String::new()),
            build: "local".to_string(),
            disabled: "keep".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

#[tokio::test]
async fn test_derived_struct_is_populated() {
    let (loader, gcp, aws) = loader(
        StaticFetcher::new(Provider::Gcp).with_secret(GCP_TOKEN, "from-gcp"),
        StaticFetcher::new(Provider::Aws)
            .with_secret("prod/token", "from-aws")
            .with_secret("prod/db", "hunter2")
            .with_secret("prod/build", "abc123"),
    );

    let mut config = ServiceConfig::new();
    loader
        .populate(&FetchContext::new(), &mut config)
        .await
        .unwrap();

    assert_eq!(config.token, "from-gcp");
    assert_eq!(config.db_password.expose_secret(), "hunter2");
    assert_eq!(config.build, "local");
    assert_eq!(config.disabled, "keep");
    assert_eq!(config.region, "us-east-1");
    assert_eq!(gcp.calls(), [GCP_TOKEN]);
    assert_eq!(aws.calls(), ["prod/db"]);
}

#[tokio::test]
async fn test_failure_keeps_earlier_fields() {
    let (loader, _, aws) = loader(
        StaticFetcher::new(Provider::Gcp).with_secret(GCP_TOKEN, "from-gcp"),
        StaticFetcher::new(Provider::Aws).with_failure("prod/db", "AccessDeniedException"),
    );

    let mut config = ServiceConfig::new();
    let err = loader
        .populate(&FetchContext::new(), &mut config)
        .await
        .unwrap_err();

    assert_eq!(err.field(), Some("db_password"));
    assert!(err.root().to_string().contains("AccessDeniedException"));
    assert_eq!(config.token, "from-gcp");
    assert_eq!(config.db_password.expose_secret(), "");
    assert_eq!(aws.calls(), ["prod/db"]);
}

#[derive(SecretConfig)]
struct BadConfig {
    #[secret(aws = "prod/name")]
    name: String,
    #[secret(gcp = "projects/p/secrets/port/versions/1")]
    port: u16,
}

#[tokio::test]
async fn test_non_text_field_is_type_mismatch() {
    let (loader, gcp, _) = loader(
        StaticFetcher::new(Provider::Gcp).with_secret("projects/p/secrets/port/versions/1", "8080"),
        StaticFetcher::new(Provider::Aws).with_secret("prod/name", "svc"),
    );

    let mut config = BadConfig {
        name: String::new(),
        port: 0,
    };
    let err = loader
        .populate(&FetchContext::new(), &mut config)
        .await
        .unwrap_err();

    match err.root() {
        SecretError::TypeMismatch {
            field,
            provider,
            identifier,
            ..
        } => {
            assert_eq!(field, "port");
            assert_eq!(*provider, Provider::Gcp);
            assert_eq!(identifier, "projects/p/secrets/port/versions/1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(config.name, "svc");
    assert_eq!(config.port, 0);
    assert!(gcp.calls().is_empty());
}

#[tokio::test]
async fn test_cancelled_context_touches_nothing() {
    let (loader, gcp, aws) = loader(
        StaticFetcher::new(Provider::Gcp).with_secret(GCP_TOKEN, "from-gcp"),
        StaticFetcher::new(Provider::Aws).with_secret("prod/db", "hunter2"),
    );
    let ctx = FetchContext::new();
    ctx.cancel();

    let mut config = ServiceConfig::new();
    let err = loader.populate(&ctx, &mut config).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(config.token, "");
    assert!(gcp.calls().is_empty());
    assert!(aws.calls().is_empty());
}

mod renamed {
    // The derive resolves runtime types through a configurable path.
    use cleanenv_secrets as runtime;
    use cleanenv_secrets::SecretFields;

    #[derive(cleanenv::SecretConfig)]
    #[secret(crate = "runtime")]
    struct Config {
        #[secret(aws = "prod/key")]
        key: String,
    }

    #[test]
    fn test_custom_crate_path() {
        let mut config = Config { key: String::new() };
        let fields = config.secret_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name(), "key");
        assert_eq!(fields[0].annotation(runtime::Provider::Aws), Some("prod/key"));
    }
}

#[test]
fn test_manifest_order_and_flags() {
    let mut config = ServiceConfig::new();
    let fields = config.secret_fields();

    let names: Vec<_> = fields.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["token", "db_password", "build", "disabled"]);
    assert!(!fields[2].is_writable());
    assert!(fields[3].source().is_none());
}
