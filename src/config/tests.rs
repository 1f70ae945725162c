use std::io::Write;

use super::*;

fn raw_with_store() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.content_store.project_id = Some("abc123".to_string());
    raw
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = raw_with_store();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(raw_with_store()).expect("valid settings");

    assert_eq!(
        settings.content_store.base_url.as_str(),
        "https://abc123.api.sanity.io/"
    );
    assert_eq!(settings.content_store.dataset, "production");
    assert_eq!(settings.content_store.timeout, Duration::from_secs(10));
    assert_eq!(settings.webhook.signature_header, "sanity-webhook-signature");
    assert_eq!(settings.webhook.operation_header, "sanity-operation");
    assert_eq!(settings.invalidation.concurrency.get(), 8);
    assert!(settings.invalidation.endpoint.is_none());
    assert_eq!(settings.resolver.max_hops.get(), 2);
    assert_eq!(
        settings.resolver.singleton_routes.get("homepage").map(String::as_str),
        Some("/")
    );
    assert_eq!(settings.search.body_max_chars, 8000);
    assert_eq!(settings.search.batch_size.get(), 500);
    assert!(!settings.search.enabled());
}

#[test]
fn content_store_location_is_required() {
    let err = Settings::from_raw(RawSettings::default()).expect_err("missing store must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "content_store.base_url",
            ..
        }
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = raw_with_store();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = raw_with_store();
    raw.invalidation.concurrency = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero concurrency");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "invalidation.concurrency",
            ..
        }
    ));

    let mut raw = raw_with_store();
    raw.resolver.topic_page_size = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = raw_with_store();
    raw.resolver.max_hops = Some(MAX_HOPS_CEILING + 1);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn search_backend_requires_credentials() {
    let mut raw = raw_with_store();
    raw.search.index_name = Some("content".to_string());
    raw.search.application_id = Some("APP".to_string());
    let err = Settings::from_raw(raw).expect_err("missing api key");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "search.api_key",
            ..
        }
    ));

    let mut raw = raw_with_store();
    raw.search.index_name = Some("content".to_string());
    raw.search.application_id = Some("APP".to_string());
    raw.search.api_key = Some("KEY".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    let backend = settings.search.backend.expect("backend");
    assert_eq!(backend.base_url.as_str(), "https://app.algolia.net/");
}

#[test]
fn duplicate_page_types_are_rejected() {
    let mut raw = raw_with_store();
    raw.resolver.pages = Some(vec![
        RawPageType {
            doc_type: "post".to_string(),
            kind: PageKind::Post,
            route: None,
        },
        RawPageType {
            doc_type: "post".to_string(),
            kind: PageKind::Topic,
            route: None,
        },
    ]);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn config_file_layers_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        r#"
[server]
port = 8080

[content_store]
base_url = "http://127.0.0.1:9999"
dataset = "staging"

[resolver]
max_hops = 3
module_types = ["promo"]

[[resolver.pages]]
type = "landingPage"
kind = "fixed"
route = "/"

[[resolver.pages]]
type = "article"
kind = "post"
"#
    )
    .expect("write config");

    let path = file.path().to_string_lossy().into_owned();
    let cli = CliArgs::parse_from([
        "revalidator",
        "--config-file",
        path.as_str(),
        "serve",
        "--server-port",
        "9090",
    ]);
    let settings = load(&cli).expect("settings");

    assert_eq!(settings.server.addr.port(), 9090);
    assert_eq!(settings.content_store.dataset, "staging");
    assert_eq!(settings.resolver.max_hops.get(), 3);
    assert_eq!(settings.resolver.module_types, vec!["promo".to_string()]);
    assert_eq!(
        settings.resolver.page_kinds.get("landingPage"),
        Some(&PageKind::Fixed)
    );
    assert_eq!(
        settings.resolver.singleton_routes.get("landingPage").map(String::as_str),
        Some("/")
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["revalidator"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_resolve_arguments() {
    let args = CliArgs::parse_from([
        "revalidator",
        "resolve",
        "post-1",
        "--type",
        "post",
        "--slug",
        "posts/my-story",
        "--operation",
        "delete",
        "--resolver-max-hops",
        "3",
        "--parent",
        "about",
    ]);

    match args.command.expect("resolve command") {
        Command::Resolve(resolve) => {
            assert_eq!(resolve.document_id, "post-1");
            assert_eq!(resolve.document_type, "post");
            assert_eq!(resolve.slug.as_deref(), Some("posts/my-story"));
            assert_eq!(resolve.operation, revalidator_types::Operation::Delete);
            assert_eq!(resolve.resolver_max_hops, Some(3));
            assert_eq!(resolve.parent.as_deref(), Some("about"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
