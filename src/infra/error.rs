//! Failures while wiring the service to its listener and upstream services.

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

/// Upstream services the revalidator talks to over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    ContentStore,
    Invalidation,
    SearchIndex,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Upstream::ContentStore => "content store",
            Upstream::Invalidation => "invalidation",
            Upstream::SearchIndex => "search index",
        })
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind webhook listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("webhook server stopped: {0}")]
    Serve(#[source] std::io::Error),
    #[error("invalid {upstream} endpoint: {source}")]
    Endpoint {
        upstream: Upstream,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build {upstream} client: {source}")]
    Client {
        upstream: Upstream,
        #[source]
        source: reqwest::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn bind(addr: SocketAddr) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Bind { addr, source }
    }

    pub fn endpoint(upstream: Upstream) -> impl FnOnce(url::ParseError) -> Self {
        move |source| Self::Endpoint { upstream, source }
    }

    pub fn client(upstream: Upstream) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Client { upstream, source }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
