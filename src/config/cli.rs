use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use revalidator_types::Operation;

/// Command-line arguments for the revalidator binary.
#[derive(Debug, Parser)]
#[command(
    name = "revalidator",
    version,
    about = "Turns CMS document changes into cache revalidation calls"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "REVALIDATOR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the webhook HTTP service.
    Serve(Box<ServeArgs>),
    /// Print the routes a document change would revalidate, without invalidating them.
    Resolve(ResolveArgs),
    /// Push every indexable document to the search index.
    Reindex(ReindexArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentStoreOverrides {
    /// Override the content store API base URL.
    #[arg(long = "content-store-base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the content store dataset.
    #[arg(long = "content-store-dataset", value_name = "NAME")]
    pub dataset: Option<String>,

    /// Override the content store read token.
    #[arg(
        long = "content-store-token",
        env = "REVALIDATOR_CONTENT_STORE_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true
    )]
    pub token: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content_store: ContentStoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the caching layer endpoint that receives invalidation calls.
    #[arg(long = "invalidation-endpoint", value_name = "URL")]
    pub invalidation_endpoint: Option<String>,

    /// Override the number of concurrent invalidation calls per webhook.
    #[arg(long = "invalidation-concurrency", value_name = "COUNT")]
    pub invalidation_concurrency: Option<u64>,

    /// Override the number of reference hops followed before falling back to every route.
    #[arg(long = "resolver-max-hops", value_name = "COUNT")]
    pub resolver_max_hops: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub content_store: ContentStoreOverrides,

    /// Override the number of reference hops followed before falling back to every route.
    #[arg(long = "resolver-max-hops", value_name = "COUNT")]
    pub resolver_max_hops: Option<u64>,

    /// Id of the changed document.
    #[arg(value_name = "DOCUMENT_ID")]
    pub document_id: String,

    /// Type tag of the changed document.
    #[arg(long = "type", value_name = "TYPE")]
    pub document_type: String,

    /// Slug of the changed document, needed to resolve deleted documents.
    #[arg(long, value_name = "SLUG")]
    pub slug: Option<String>,

    /// Id of the parent page of a deleted nested page.
    #[arg(long, value_name = "PARENT_ID")]
    pub parent: Option<String>,

    /// Kind of change (create|update|delete).
    #[arg(long, value_name = "OPERATION", default_value = "update")]
    pub operation: Operation,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ReindexArgs {
    #[command(flatten)]
    pub content_store: ContentStoreOverrides,
}
