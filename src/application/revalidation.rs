//! Revalidation use case: resolve stale routes, then invalidate each one.

use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use metrics::counter;
use revalidator_types::RevalidationSummary;
use thiserror::Error;
use tracing::info;

use crate::domain::event::ChangeEvent;

use super::invalidation::{InvalidationError, RouteInvalidator};
use super::resolver::{ResolveError, RouteResolver};

const METRIC_ROUTES_INVALIDATED: &str = "revalidator_routes_invalidated_total";

#[derive(Debug, Error)]
pub enum RevalidationError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Invalidation(#[from] InvalidationError),
}

pub struct RevalidationService {
    resolver: Arc<RouteResolver>,
    invalidator: Arc<dyn RouteInvalidator>,
    concurrency: NonZeroUsize,
}

impl RevalidationService {
    pub fn new(
        resolver: Arc<RouteResolver>,
        invalidator: Arc<dyn RouteInvalidator>,
        concurrency: NonZeroUsize,
    ) -> Self {
        Self {
            resolver,
            invalidator,
            concurrency,
        }
    }

    /// Resolve and invalidate. Nothing is invalidated when resolution fails;
    /// the first invalidation failure aborts the remaining calls.
    pub async fn revalidate(
        &self,
        event: &ChangeEvent,
    ) -> Result<RevalidationSummary, RevalidationError> {
        let resolution = self.resolver.resolve(event).await?;
        let invalidator = self.invalidator.as_ref();

        stream::iter(resolution.routes.iter())
            .map(Ok::<_, InvalidationError>)
            .try_for_each_concurrent(Some(self.concurrency.get()), |route| async move {
                invalidator.invalidate(route).await
            })
            .await?;

        let routes = resolution.routes.into_strings();
        counter!(METRIC_ROUTES_INVALIDATED).increment(routes.len() as u64);
        info!(
            target = "revalidator::revalidation",
            document_id = %event.document_id,
            document_type = %event.document_type,
            operation = %event.operation,
            routes = routes.len(),
            full_enumeration = resolution.full_enumeration,
            "revalidated routes"
        );

        Ok(RevalidationSummary {
            document_id: event.document_id.clone(),
            document_type: event.document_type.clone(),
            routes,
        })
    }
}
