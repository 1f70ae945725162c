//! Route invalidators backed by the caching layer's HTTP endpoint.

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, info};

use crate::application::invalidation::{InvalidationError, RouteInvalidator};
use crate::config::InvalidationSettings;
use crate::domain::route::Route;

use super::content_store::user_agent;
use super::error::{InfraError, Upstream};

const METRIC_INVALIDATION_FAILED: &str = "revalidator_invalidation_failed_total";

#[derive(Serialize)]
struct InvalidateBody<'a> {
    path: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpRouteInvalidator {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpRouteInvalidator {
    pub fn new(endpoint: Url, settings: &InvalidationSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(InfraError::client(Upstream::Invalidation))?;
        Ok(Self {
            client,
            endpoint,
            token: settings.token.clone(),
        })
    }
}

#[async_trait]
impl RouteInvalidator for HttpRouteInvalidator {
    async fn invalidate(&self, route: &Route) -> Result<(), InvalidationError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&InvalidateBody {
                path: route.as_str(),
            });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            counter!(METRIC_INVALIDATION_FAILED).increment(1);
            InvalidationError::transport(route, err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            counter!(METRIC_INVALIDATION_FAILED).increment(1);
            return Err(InvalidationError::Rejected {
                route: route.to_string(),
                status: status.as_u16(),
            });
        }
        debug!(target = "revalidator::invalidator", route = %route, "route invalidated");
        Ok(())
    }
}

/// Used when no caching endpoint is configured: logs instead of calling out.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInvalidator;

#[async_trait]
impl RouteInvalidator for LoggingInvalidator {
    async fn invalidate(&self, route: &Route) -> Result<(), InvalidationError> {
        info!(
            target = "revalidator::invalidator",
            route = %route,
            dry_run = true,
            "would invalidate route"
        );
        Ok(())
    }
}
