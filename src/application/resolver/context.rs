//! Per-resolution query helpers shared by every route handler.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join_all;
use futures::try_join;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::store::ContentStore;
use crate::domain::documents::DocumentSummary;
use crate::domain::event::ChangeEvent;
use crate::domain::route::{Route, RouteSet};
use crate::domain::types::PageKind;

use super::ResolveError;
use super::config::ResolverConfig;

pub(crate) const METRIC_DEPTH_EXCEEDED: &str = "revalidator_depth_exceeded_total";
pub(crate) const METRIC_FULL_ENUMERATION: &str = "revalidator_full_enumeration_total";

/// Why the resolver fell back to every known route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullReason {
    /// The changed document is itself a global type.
    GlobalChange,
    /// A global document references the changed document.
    GlobalReferrer,
    /// A module chain continued past the hop budget.
    DepthExceeded,
    /// A deleted nested page did not say which parent listed it.
    UnknownParent,
}

impl FullReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FullReason::GlobalChange => "global_change",
            FullReason::GlobalReferrer => "global_referrer",
            FullReason::DepthExceeded => "depth_exceeded",
            FullReason::UnknownParent => "unknown_parent",
        }
    }
}

/// Everything a handler can see while resolving one change event.
///
/// Lives for a single resolution; nothing is shared between requests.
pub struct ResolveContext<'a> {
    pub(crate) store: &'a dyn ContentStore,
    pub(crate) config: &'a ResolverConfig,
    pub(crate) event: &'a ChangeEvent,
    full: AtomicBool,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        config: &'a ResolverConfig,
        event: &'a ChangeEvent,
    ) -> Self {
        Self {
            store,
            config,
            event,
            full: AtomicBool::new(false),
        }
    }

    /// Whether any step of this resolution produced the full route enumeration.
    pub fn used_full_enumeration(&self) -> bool {
        self.full.load(Ordering::Relaxed)
    }

    /// Fetch the changed document. `None` when it no longer exists.
    pub async fn changed_document(&self) -> Result<Option<DocumentSummary>, ResolveError> {
        Ok(self.store.document(&self.event.document_id).await?)
    }

    /// Route of the changed document itself.
    pub async fn own_route(&self) -> Result<Option<Route>, ResolveError> {
        if let Some(route) = self.own_route_without_lookup() {
            return Ok(Some(route));
        }
        let document = self.changed_document().await?;
        Ok(self.own_route_from(document.as_ref()))
    }

    /// Route of the changed document given an already fetched copy of it.
    pub fn own_route_from(&self, document: Option<&DocumentSummary>) -> Option<Route> {
        if let Some(route) = self.own_route_without_lookup() {
            return Some(route);
        }
        let route = document.and_then(|document| self.config.route_for(document));
        if route.is_none() {
            warn!(
                target = "revalidator::resolver",
                document_id = %self.event.document_id,
                document_type = %self.event.document_type,
                operation = %self.event.operation,
                "changed document has no resolvable route"
            );
        }
        route
    }

    fn own_route_without_lookup(&self) -> Option<Route> {
        self.config
            .singleton_route(&self.event.document_type)
            .or_else(|| {
                self.event
                    .slug
                    .as_deref()
                    .map(str::trim)
                    .filter(|slug| !slug.is_empty())
                    .map(Route::from_path)
            })
    }

    /// Routes of every page that reaches `target_id` through references.
    ///
    /// Walks referrers breadth first. Page hits map to their routes; module
    /// hits are followed on the next hop until `max_hops` edges have been
    /// crossed. A global referrer, or a module found on the last hop, turns
    /// the answer into the full enumeration.
    pub async fn referencing_routes(&self, target_id: &str) -> Result<RouteSet, ResolveError> {
        let page_types = self.config.page_and_global_types();
        let module_types = self.config.module_types.clone();
        let max_hops = self.config.max_hops.get();

        let mut routes = RouteSet::new();
        let mut visited: HashSet<String> = HashSet::from([target_id.to_string()]);
        let mut frontier = vec![target_id.to_string()];

        for hop in 1..=max_hops {
            if frontier.is_empty() {
                break;
            }

            let lookups = frontier.iter().map(|id| {
                let page_types = &page_types;
                let module_types = &module_types;
                async move {
                    try_join!(
                        self.store.referencing(id, page_types),
                        self.store.referencing(id, module_types),
                    )
                }
            });
            let hits = try_join_all(lookups).await?;

            let mut next = Vec::new();
            for (pages, modules) in hits {
                for page in pages {
                    if self.config.is_global(&page.doc_type) {
                        debug!(
                            target = "revalidator::resolver",
                            referrer = %page.id,
                            "global document references the change"
                        );
                        return self.full_enumeration(FullReason::GlobalReferrer).await;
                    }
                    if let Some(route) = self.config.route_for(&page) {
                        routes.insert(route);
                    }
                }
                for module in modules {
                    if visited.insert(module.id.clone()) {
                        next.push(module.id);
                    }
                }
            }

            if hop == max_hops && !next.is_empty() {
                warn!(
                    target = "revalidator::resolver",
                    document_id = %self.event.document_id,
                    max_hops,
                    unresolved_modules = next.len(),
                    "module chain exceeds hop budget; invalidating every route"
                );
                counter!(METRIC_DEPTH_EXCEEDED).increment(1);
                return self.full_enumeration(FullReason::DepthExceeded).await;
            }
            frontier = next;
        }

        Ok(routes)
    }

    /// Every route the site serves: static routes, singletons, slug-routed
    /// pages and the paginated listing of each topic.
    pub async fn full_enumeration(&self, reason: FullReason) -> Result<RouteSet, ResolveError> {
        self.full.store(true, Ordering::Relaxed);
        counter!(METRIC_FULL_ENUMERATION, "reason" => reason.as_str()).increment(1);

        let routable_types = self.config.slug_routed_types();
        let topic_types = self.config.tags_of_kind(PageKind::Topic);

        let (pages, topics) = try_join!(
            self.store.documents_of_types(&routable_types),
            self.store.documents_of_types(&topic_types),
        )?;

        let mut routes: RouteSet = self.config.static_routes.iter().cloned().collect();
        routes.extend(self.config.singleton_routes.values().cloned());
        routes.extend(pages.iter().filter_map(|page| self.config.route_for(page)));

        let listings = topics
            .iter()
            .filter_map(|topic| self.config.route_for(topic).map(|route| (topic, route)))
            .map(|(topic, route)| async move {
                let count = self
                    .store
                    .count_referencing(&topic.id, &self.config.post_types)
                    .await?;
                Ok::<_, ResolveError>(self.config.topic_routes(&route, count))
            });
        for listing in try_join_all(listings).await? {
            routes.extend(listing);
        }

        debug!(
            target = "revalidator::resolver",
            reason = reason.as_str(),
            routes = routes.len(),
            "full route enumeration"
        );
        Ok(routes)
    }
}
