//! One handler per document classification.

use async_trait::async_trait;
use futures::try_join;
use tracing::warn;

use crate::domain::documents::DocumentSummary;
use crate::domain::event::EventParent;
use crate::domain::route::{Route, RouteSet};

use super::ResolveError;
use super::context::{FullReason, ResolveContext};

#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Stable name used in logs and metric labels.
    fn name(&self) -> &'static str;

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError>;
}

/// Shared content block: stale wherever it is embedded.
pub struct ModuleHandler;

#[async_trait]
impl RouteHandler for ModuleHandler {
    fn name(&self) -> &'static str {
        "module"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        cx.referencing_routes(&cx.event.document_id).await
    }
}

/// Site-wide document: every page may render it.
pub struct GlobalHandler;

#[async_trait]
impl RouteHandler for GlobalHandler {
    fn name(&self) -> &'static str {
        "global"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        cx.full_enumeration(FullReason::GlobalChange).await
    }
}

/// Singleton page with a fixed route.
pub struct FixedHandler;

#[async_trait]
impl RouteHandler for FixedHandler {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        Ok(cx.own_route().await?.into_iter().collect())
    }
}

pub struct PostHandler;

#[async_trait]
impl RouteHandler for PostHandler {
    fn name(&self) -> &'static str {
        "post"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        let (own, mut routes) = try_join!(
            cx.own_route(),
            cx.referencing_routes(&cx.event.document_id)
        )?;
        routes.extend(own);
        Ok(routes)
    }
}

/// Location page; the locations index lists every location.
pub struct LocationHandler;

#[async_trait]
impl RouteHandler for LocationHandler {
    fn name(&self) -> &'static str {
        "location"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        let (own, mut routes) = try_join!(
            cx.own_route(),
            cx.referencing_routes(&cx.event.document_id)
        )?;
        routes.extend(own);
        routes.insert(cx.config.locations_index.clone());
        Ok(routes)
    }
}

/// Nested page; its parent renders a list of children.
pub struct SubPageHandler;

#[async_trait]
impl RouteHandler for SubPageHandler {
    fn name(&self) -> &'static str {
        "sub_page"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        let (stored, mut routes) = try_join!(
            cx.changed_document(),
            cx.referencing_routes(&cx.event.document_id)
        )?;

        // A deleted page is gone from the store; fall back to what the delivery carried.
        let unknown_parent =
            stored.is_none() && cx.event.is_delete() && cx.event.parent == EventParent::Unreported;
        let document = stored.unwrap_or_else(|| cx.event.reported_document());

        routes.extend(cx.own_route_from(Some(&document)));
        if let Some(parent) = document.parent.as_deref() {
            routes.extend(parent_route(cx, parent).await?);
        } else if unknown_parent {
            warn!(
                target = "revalidator::resolver",
                document_id = %cx.event.document_id,
                document_type = %cx.event.document_type,
                "deleted sub page did not report its parent"
            );
            routes.merge(cx.full_enumeration(FullReason::UnknownParent).await?);
        }
        Ok(routes)
    }
}

/// Parent route from the projection, or from the stored parent when only its id is known.
async fn parent_route(
    cx: &ResolveContext<'_>,
    parent: &DocumentSummary,
) -> Result<Option<Route>, ResolveError> {
    if let Some(route) = cx.config.route_for(parent) {
        return Ok(Some(route));
    }
    let stored = cx.store.document(&parent.id).await?;
    Ok(stored.as_ref().and_then(|parent| cx.config.route_for(parent)))
}

/// Topic landing page with a paginated listing of its posts.
pub struct TopicHandler;

#[async_trait]
impl RouteHandler for TopicHandler {
    fn name(&self) -> &'static str {
        "topic"
    }

    async fn routes(&self, cx: &ResolveContext<'_>) -> Result<RouteSet, ResolveError> {
        let id = &cx.event.document_id;
        let (own, post_count, mut routes) = try_join!(
            cx.own_route(),
            async {
                cx.store
                    .count_referencing(id, &cx.config.post_types)
                    .await
                    .map_err(ResolveError::from)
            },
            cx.referencing_routes(id),
        )?;

        match own {
            Some(topic_route) => routes.extend(cx.config.topic_routes(&topic_route, post_count)),
            None => warn!(
                target = "revalidator::resolver",
                document_id = %id,
                "topic has no route; skipping its listing pages"
            ),
        }
        Ok(routes)
    }
}
