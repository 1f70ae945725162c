//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::resolver::config::{
    DEFAULT_GLOBAL_TYPES, DEFAULT_LOCATIONS_INDEX, DEFAULT_MAX_HOPS, DEFAULT_MODULE_TYPES,
    DEFAULT_POST_TYPES, DEFAULT_STATIC_ROUTES, DEFAULT_TOPIC_PAGE_SIZE, default_page_kinds,
    default_singleton_routes, to_strings,
};
use crate::domain::types::PageKind;

pub use cli::{
    CliArgs, Command, ContentStoreOverrides, ReindexArgs, ResolveArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "revalidator";
const ENV_PREFIX: &str = "REVALIDATOR";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;
const DEFAULT_SIGNATURE_HEADER: &str = "sanity-webhook-signature";
const DEFAULT_OPERATION_HEADER: &str = "sanity-operation";
const DEFAULT_DATASET: &str = "production";
const DEFAULT_API_VERSION: &str = "2024-01-01";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INVALIDATION_CONCURRENCY: u64 = 8;
const DEFAULT_INVALIDATION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INDEXABLE_TYPES: &[&str] = &["post", "location", "subPage"];
const DEFAULT_BODY_MAX_CHARS: u64 = 8000;
const DEFAULT_SEARCH_BATCH_SIZE: u64 = 500;
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 10;
const MAX_HOPS_CEILING: u64 = 16;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub webhook: WebhookSettings,
    pub content_store: ContentStoreSettings,
    pub resolver: ResolverSettings,
    pub invalidation: InvalidationSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Shared HMAC secret; `serve` refuses to start without one.
    pub secret: Option<String>,
    pub signature_header: String,
    pub operation_header: String,
    /// Maximum accepted clock skew of the signature timestamp.
    pub tolerance: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ContentStoreSettings {
    pub base_url: Url,
    pub dataset: String,
    pub api_version: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub module_types: Vec<String>,
    pub global_types: Vec<String>,
    pub page_kinds: BTreeMap<String, PageKind>,
    pub singleton_routes: BTreeMap<String, String>,
    pub static_routes: Vec<String>,
    pub locations_index: String,
    pub post_types: Vec<String>,
    pub topic_page_size: NonZeroU32,
    pub max_hops: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    /// Caching layer endpoint; without one invalidation is logged only.
    pub endpoint: Option<Url>,
    pub token: Option<String>,
    pub concurrency: NonZeroUsize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Index connection; search indexing is disabled without one.
    pub backend: Option<SearchBackendSettings>,
    pub reindex_secret: Option<String>,
    pub indexable_types: Vec<String>,
    pub body_max_chars: usize,
    pub batch_size: NonZeroUsize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchBackendSettings {
    pub base_url: Url,
    pub index_name: String,
    pub application_id: String,
    pub api_key: String,
}

impl SearchSettings {
    pub fn enabled(&self) -> bool {
        self.backend.is_some()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Resolve(args)) => {
            raw.apply_content_store_overrides(&args.content_store);
            if let Some(hops) = args.resolver_max_hops {
                raw.resolver.max_hops = Some(hops);
            }
        }
        Some(Command::Reindex(args)) => raw.apply_content_store_overrides(&args.content_store),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    webhook: RawWebhookSettings,
    content_store: RawContentStoreSettings,
    resolver: RawResolverSettings,
    invalidation: RawInvalidationSettings,
    search: RawSearchSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(endpoint) = overrides.invalidation_endpoint.as_ref() {
            self.invalidation.endpoint = Some(endpoint.clone());
        }
        if let Some(concurrency) = overrides.invalidation_concurrency {
            self.invalidation.concurrency = Some(concurrency);
        }
        if let Some(hops) = overrides.resolver_max_hops {
            self.resolver.max_hops = Some(hops);
        }

        self.apply_content_store_overrides(&overrides.content_store);
    }

    fn apply_content_store_overrides(&mut self, overrides: &ContentStoreOverrides) {
        if let Some(url) = overrides.base_url.as_ref() {
            self.content_store.base_url = Some(url.clone());
        }
        if let Some(dataset) = overrides.dataset.as_ref() {
            self.content_store.dataset = Some(dataset.clone());
        }
        if let Some(token) = overrides.token.as_ref() {
            self.content_store.token = Some(token.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            webhook,
            content_store,
            resolver,
            invalidation,
            search,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let webhook = build_webhook_settings(webhook)?;
        let content_store = build_content_store_settings(content_store)?;
        let resolver = build_resolver_settings(resolver)?;
        let invalidation = build_invalidation_settings(invalidation)?;
        let search = build_search_settings(search)?;

        Ok(Self {
            server,
            logging,
            webhook,
            content_store,
            resolver,
            invalidation,
            search,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let max_body_bytes = non_zero_usize(
        server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
        "server.max_body_bytes",
    )?
    .get();

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        max_body_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_webhook_settings(webhook: RawWebhookSettings) -> Result<WebhookSettings, LoadError> {
    let signature_header = header_name(
        webhook.signature_header,
        DEFAULT_SIGNATURE_HEADER,
        "webhook.signature_header",
    )?;
    let operation_header = header_name(
        webhook.operation_header,
        DEFAULT_OPERATION_HEADER,
        "webhook.operation_header",
    )?;

    let tolerance = match webhook.tolerance_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "webhook.tolerance_seconds",
                "must be greater than zero when set",
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => None,
    };

    Ok(WebhookSettings {
        secret: non_blank(webhook.secret),
        signature_header,
        operation_header,
        tolerance,
    })
}

fn build_content_store_settings(
    store: RawContentStoreSettings,
) -> Result<ContentStoreSettings, LoadError> {
    let base_url = match (non_blank(store.base_url), non_blank(store.project_id)) {
        (Some(url), _) => parse_url(&url, "content_store.base_url")?,
        (None, Some(project_id)) => parse_url(
            &format!("https://{project_id}.api.sanity.io"),
            "content_store.project_id",
        )?,
        (None, None) => {
            return Err(LoadError::invalid(
                "content_store.base_url",
                "set either `base_url` or `project_id`",
            ));
        }
    };

    let dataset = non_blank(store.dataset).unwrap_or_else(|| DEFAULT_DATASET.to_string());
    let api_version =
        non_blank(store.api_version).unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

    Ok(ContentStoreSettings {
        base_url,
        dataset,
        api_version,
        token: non_blank(store.token),
        timeout: seconds(
            store.timeout_seconds,
            DEFAULT_STORE_TIMEOUT_SECS,
            "content_store.timeout_seconds",
        )?,
    })
}

fn build_resolver_settings(resolver: RawResolverSettings) -> Result<ResolverSettings, LoadError> {
    let max_hops = resolver.max_hops.unwrap_or(u64::from(DEFAULT_MAX_HOPS));
    if max_hops > MAX_HOPS_CEILING {
        return Err(LoadError::invalid(
            "resolver.max_hops",
            format!("must not exceed {MAX_HOPS_CEILING}"),
        ));
    }

    let (page_kinds, singleton_routes) = match resolver.pages {
        Some(pages) => page_tables(pages)?,
        None => (default_page_kinds(), default_singleton_routes()),
    };

    Ok(ResolverSettings {
        module_types: resolver
            .module_types
            .unwrap_or_else(|| to_strings(DEFAULT_MODULE_TYPES)),
        global_types: resolver
            .global_types
            .unwrap_or_else(|| to_strings(DEFAULT_GLOBAL_TYPES)),
        page_kinds,
        singleton_routes,
        static_routes: resolver
            .static_routes
            .unwrap_or_else(|| to_strings(DEFAULT_STATIC_ROUTES)),
        locations_index: resolver
            .locations_index
            .unwrap_or_else(|| DEFAULT_LOCATIONS_INDEX.to_string()),
        post_types: resolver
            .post_types
            .unwrap_or_else(|| to_strings(DEFAULT_POST_TYPES)),
        topic_page_size: non_zero_u32(
            resolver
                .topic_page_size
                .unwrap_or(u64::from(DEFAULT_TOPIC_PAGE_SIZE)),
            "resolver.topic_page_size",
        )?,
        max_hops: non_zero_u32(max_hops, "resolver.max_hops")?,
    })
}

type PageTables = (BTreeMap<String, PageKind>, BTreeMap<String, String>);

fn page_tables(pages: Vec<RawPageType>) -> Result<PageTables, LoadError> {
    let mut kinds = BTreeMap::new();
    let mut routes = BTreeMap::new();
    for page in pages {
        let tag = page.doc_type.trim().to_string();
        if tag.is_empty() {
            return Err(LoadError::invalid("resolver.pages", "page type must not be empty"));
        }
        if kinds.insert(tag.clone(), page.kind).is_some() {
            return Err(LoadError::invalid(
                "resolver.pages",
                format!("`{tag}` is listed more than once"),
            ));
        }
        if let Some(route) = non_blank(page.route) {
            routes.insert(tag, route);
        }
    }
    Ok((kinds, routes))
}

fn build_invalidation_settings(
    invalidation: RawInvalidationSettings,
) -> Result<InvalidationSettings, LoadError> {
    let endpoint = non_blank(invalidation.endpoint)
        .map(|url| parse_url(&url, "invalidation.endpoint"))
        .transpose()?;

    Ok(InvalidationSettings {
        endpoint,
        token: non_blank(invalidation.token),
        concurrency: non_zero_usize(
            invalidation
                .concurrency
                .unwrap_or(DEFAULT_INVALIDATION_CONCURRENCY),
            "invalidation.concurrency",
        )?,
        timeout: seconds(
            invalidation.timeout_seconds,
            DEFAULT_INVALIDATION_TIMEOUT_SECS,
            "invalidation.timeout_seconds",
        )?,
    })
}

fn build_search_settings(search: RawSearchSettings) -> Result<SearchSettings, LoadError> {
    let backend = match non_blank(search.index_name) {
        Some(index_name) => {
            let application_id = non_blank(search.application_id).ok_or_else(|| {
                LoadError::invalid("search.application_id", "required when an index is set")
            })?;
            let api_key = non_blank(search.api_key).ok_or_else(|| {
                LoadError::invalid("search.api_key", "required when an index is set")
            })?;
            let base_url = match non_blank(search.base_url) {
                Some(url) => parse_url(&with_trailing_slash(url), "search.base_url")?,
                None => parse_url(
                    &format!("https://{application_id}.algolia.net/"),
                    "search.application_id",
                )?,
            };
            Some(SearchBackendSettings {
                base_url,
                index_name,
                application_id,
                api_key,
            })
        }
        None => None,
    };

    Ok(SearchSettings {
        backend,
        reindex_secret: non_blank(search.reindex_secret),
        indexable_types: search
            .indexable_types
            .unwrap_or_else(|| to_strings(DEFAULT_INDEXABLE_TYPES)),
        body_max_chars: non_zero_usize(
            search.body_max_chars.unwrap_or(DEFAULT_BODY_MAX_CHARS),
            "search.body_max_chars",
        )?
        .get(),
        batch_size: non_zero_usize(
            search.batch_size.unwrap_or(DEFAULT_SEARCH_BATCH_SIZE),
            "search.batch_size",
        )?,
        timeout: seconds(
            search.timeout_seconds,
            DEFAULT_SEARCH_TIMEOUT_SECS,
            "search.timeout_seconds",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWebhookSettings {
    secret: Option<String>,
    signature_header: Option<String>,
    operation_header: Option<String>,
    tolerance_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentStoreSettings {
    base_url: Option<String>,
    project_id: Option<String>,
    dataset: Option<String>,
    api_version: Option<String>,
    token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResolverSettings {
    module_types: Option<Vec<String>>,
    global_types: Option<Vec<String>>,
    pages: Option<Vec<RawPageType>>,
    static_routes: Option<Vec<String>>,
    locations_index: Option<String>,
    post_types: Option<Vec<String>>,
    topic_page_size: Option<u64>,
    max_hops: Option<u64>,
}

/// One `[[resolver.pages]]` entry. Listed as tables so CMS type tags never become config keys.
#[derive(Debug, Clone, Deserialize)]
struct RawPageType {
    #[serde(rename = "type")]
    doc_type: String,
    kind: PageKind,
    route: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    endpoint: Option<String>,
    token: Option<String>,
    concurrency: Option<u64>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSearchSettings {
    base_url: Option<String>,
    index_name: Option<String>,
    application_id: Option<String>,
    api_key: Option<String>,
    reindex_secret: Option<String>,
    indexable_types: Option<Vec<String>>,
    body_max_chars: Option<u64>,
    batch_size: Option<u64>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    Url::parse(value).map_err(|err| LoadError::invalid(key, format!("invalid URL: {err}")))
}

fn with_trailing_slash(mut value: String) -> String {
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

fn header_name(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let name = non_blank(value)
        .unwrap_or_else(|| default.to_string())
        .to_ascii_lowercase();
    if !name
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
    {
        return Err(LoadError::invalid(key, "not a valid HTTP header name"));
    }
    Ok(name)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn seconds(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    let seconds = value.unwrap_or(default);
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
