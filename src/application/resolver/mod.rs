//! Route invalidation resolver.
//!
//! Maps one change event to every public route whose cached rendering may
//! now be stale. Dispatch goes through a handler map keyed by type tag;
//! all type lists come from [`ResolverConfig`].

pub mod config;
pub mod context;
pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::store::{ContentStore, StoreError};
use crate::domain::event::ChangeEvent;
use crate::domain::route::RouteSet;
use crate::domain::types::{PageKind, TypeClass};

pub use self::config::ResolverConfig;
pub use context::{FullReason, ResolveContext};
pub use handlers::RouteHandler;

use handlers::{
    FixedHandler, GlobalHandler, LocationHandler, ModuleHandler, PostHandler, SubPageHandler,
    TopicHandler,
};

const METRIC_RESOLVE_MS: &str = "revalidator_resolve_ms";
const METRIC_UNKNOWN_TYPE: &str = "revalidator_unknown_type_total";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid change event: {0}")]
    InvalidEvent(String),
    #[error("content store query failed")]
    Store(#[from] StoreError),
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub routes: RouteSet,
    pub class: TypeClass,
    /// Set when the answer is the full route enumeration.
    pub full_enumeration: bool,
}

impl Resolution {
    pub fn unknown_type(&self) -> bool {
        self.class == TypeClass::Unknown
    }
}

pub struct RouteResolver {
    store: Arc<dyn ContentStore>,
    config: Arc<ResolverConfig>,
    handlers: HashMap<String, Arc<dyn RouteHandler>>,
}

impl RouteResolver {
    pub fn new(store: Arc<dyn ContentStore>, config: ResolverConfig) -> Self {
        let handlers = build_handlers(&config);
        Self {
            store,
            config: Arc::new(config),
            handlers,
        }
    }

    #[instrument(
        skip(self, event),
        fields(document_id = %event.document_id, document_type = %event.document_type)
    )]
    pub async fn resolve(&self, event: &ChangeEvent) -> Result<Resolution, ResolveError> {
        if event.document_id.trim().is_empty() {
            return Err(ResolveError::InvalidEvent(
                "document id must not be empty".to_string(),
            ));
        }

        let class = self.config.classify(&event.document_type);
        let Some(handler) = self.handlers.get(&event.document_type) else {
            warn!(
                target = "revalidator::resolver",
                document_id = %event.document_id,
                document_type = %event.document_type,
                "unknown document type; nothing to revalidate"
            );
            counter!(METRIC_UNKNOWN_TYPE).increment(1);
            return Ok(Resolution {
                routes: RouteSet::new(),
                class: TypeClass::Unknown,
                full_enumeration: false,
            });
        };

        let started_at = Instant::now();
        let cx = ResolveContext::new(self.store.as_ref(), &self.config, event);
        let routes = handler.routes(&cx).await?;

        histogram!(METRIC_RESOLVE_MS, "handler" => handler.name())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "revalidator::resolver",
            handler = handler.name(),
            routes = routes.len(),
            full_enumeration = cx.used_full_enumeration(),
            "resolved stale routes"
        );

        Ok(Resolution {
            routes,
            class,
            full_enumeration: cx.used_full_enumeration(),
        })
    }
}

/// Later inserts win, so module types override global types, which override page kinds.
fn build_handlers(config: &ResolverConfig) -> HashMap<String, Arc<dyn RouteHandler>> {
    let mut handlers: HashMap<String, Arc<dyn RouteHandler>> = HashMap::new();

    for (tag, kind) in &config.page_kinds {
        let handler: Arc<dyn RouteHandler> = match kind {
            PageKind::Fixed => Arc::new(FixedHandler),
            PageKind::Post => Arc::new(PostHandler),
            PageKind::Location => Arc::new(LocationHandler),
            PageKind::SubPage => Arc::new(SubPageHandler),
            PageKind::Topic => Arc::new(TopicHandler),
        };
        handlers.insert(tag.clone(), handler);
    }

    let global: Arc<dyn RouteHandler> = Arc::new(GlobalHandler);
    for tag in &config.global_types {
        handlers.insert(tag.clone(), Arc::clone(&global));
    }

    let module: Arc<dyn RouteHandler> = Arc::new(ModuleHandler);
    for tag in &config.module_types {
        handlers.insert(tag.clone(), Arc::clone(&module));
    }

    handlers
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use revalidator_types::Operation;

    use super::*;
    use crate::application::store::{InMemoryContentStore, StoredDocument};
    use crate::domain::documents::DocumentSummary;
    use crate::domain::event::EventParent;

    fn resolver(store: InMemoryContentStore) -> RouteResolver {
        RouteResolver::new(Arc::new(store), ResolverConfig::default())
    }

    fn update(id: &str, doc_type: &str) -> ChangeEvent {
        ChangeEvent::new(id, doc_type, Operation::Update)
    }

    fn site() -> InMemoryContentStore {
        InMemoryContentStore::new()
            .with(StoredDocument::new("home", "homepage"))
            .with(StoredDocument::new("loc-home", "locationHomepage"))
            .with(StoredDocument::new("post-1", "post").slug("posts/my-story"))
            .with(StoredDocument::new("about", "subPage").slug("about-us"))
            .with(StoredDocument::new("loc-1", "location").slug("locations/downtown"))
    }

    #[tokio::test]
    async fn post_without_referrers_yields_own_route() {
        let resolution = resolver(site())
            .resolve(&update("post-1", "post"))
            .await
            .expect("resolve");

        assert_eq!(resolution.routes.into_strings(), vec!["/posts/my-story"]);
        assert!(!resolution.full_enumeration);
    }

    #[tokio::test]
    async fn module_maps_to_embedding_pages() {
        let store = site()
            .with(StoredDocument::new("mod-5", "ctaText"))
            .with(StoredDocument::new("about-2", "subPage").slug("about-us").references(["mod-5"]))
            .with(StoredDocument::new("post-2", "post").slug("posts/my-story").references(["mod-5"]));

        let resolution = resolver(store)
            .resolve(&update("mod-5", "ctaText"))
            .await
            .expect("resolve");

        assert_eq!(resolution.class, TypeClass::Module);
        assert_eq!(
            resolution.routes.into_strings(),
            vec!["/about-us", "/posts/my-story"]
        );
    }

    #[tokio::test]
    async fn global_change_enumerates_every_route() {
        let store = site().with(StoredDocument::new("settings", "globalSettings"));
        let resolution = resolver(store)
            .resolve(&update("settings", "globalSettings"))
            .await
            .expect("resolve");

        assert!(resolution.full_enumeration);
        for route in ["/", "/locations", "/search", "/posts/my-story", "/about-us", "/locations/downtown"] {
            assert!(resolution.routes.contains(route), "missing {route}");
        }
    }

    #[tokio::test]
    async fn unknown_type_is_empty_and_flagged() {
        let resolution = resolver(site())
            .resolve(&update("x", "mystery"))
            .await
            .expect("resolve");
        assert!(resolution.routes.is_empty());
        assert!(resolution.unknown_type());
    }

    #[tokio::test]
    async fn empty_id_is_invalid() {
        let err = resolver(site())
            .resolve(&update("  ", "post"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, ResolveError::InvalidEvent(_)));
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = site();
        store.set_failing(true);
        let err = resolver(store)
            .resolve(&update("post-1", "post"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, ResolveError::Store(_)));
    }

    #[tokio::test]
    async fn singleton_resolves_to_fixed_route_only() {
        let resolution = resolver(site())
            .resolve(&update("loc-home", "locationHomepage"))
            .await
            .expect("resolve");
        assert_eq!(resolution.routes.into_strings(), vec!["/locations"]);
    }

    #[tokio::test]
    async fn location_adds_index() {
        let resolution = resolver(site())
            .resolve(&update("loc-1", "location"))
            .await
            .expect("resolve");
        assert_eq!(
            resolution.routes.into_strings(),
            vec!["/locations", "/locations/downtown"]
        );
    }

    #[tokio::test]
    async fn sub_page_includes_parent() {
        let store = site().with(
            StoredDocument::new("team", "subPage")
                .slug("about-us/team")
                .parent("about"),
        );
        let resolution = resolver(store)
            .resolve(&update("team", "subPage"))
            .await
            .expect("resolve");
        assert_eq!(
            resolution.routes.into_strings(),
            vec!["/about-us", "/about-us/team"]
        );
    }

    #[tokio::test]
    async fn topic_paginates_by_post_count() {
        let mut store = site().with(StoredDocument::new("t1", "topic").slug("topics/news"));
        for n in 0..5 {
            store = store.with(StoredDocument::new(format!("p{n}"), "post").references(["t1"]));
        }
        let config = ResolverConfig {
            topic_page_size: NonZeroU32::new(2).expect("non-zero"),
            ..Default::default()
        };

        let resolution = RouteResolver::new(Arc::new(store), config)
            .resolve(&update("t1", "topic"))
            .await
            .expect("resolve");

        // Posts reference the topic but have no slug, so only listing pages appear.
        assert_eq!(
            resolution.routes.into_strings(),
            vec!["/topics/news", "/topics/news/page/2", "/topics/news/page/3"]
        );
    }

    #[tokio::test]
    async fn delete_uses_event_slug() {
        let event = ChangeEvent::new("gone", "post", Operation::Delete).with_slug("posts/gone");
        let resolution = resolver(site()).resolve(&event).await.expect("resolve");
        assert_eq!(resolution.routes.into_strings(), vec!["/posts/gone"]);
    }

    #[tokio::test]
    async fn deleted_sub_page_refreshes_parent_from_event() {
        let store = InMemoryContentStore::new()
            .with(StoredDocument::new("about", "subPage").slug("about-us"));
        let event = ChangeEvent::new("team", "subPage", Operation::Delete)
            .with_slug("about-us/team")
            .with_parent(EventParent::Document(
                DocumentSummary::new("about", "subPage").with_slug("about-us"),
            ));

        let resolution = resolver(store).resolve(&event).await.expect("resolve");

        assert_eq!(
            resolution.routes.into_strings(),
            vec!["/about-us", "/about-us/team"]
        );
        assert!(!resolution.full_enumeration);
    }

    #[tokio::test]
    async fn deleted_sub_page_looks_up_parent_known_by_id() {
        let store = InMemoryContentStore::new()
            .with(StoredDocument::new("about", "subPage").slug("about-us"));
        let event = ChangeEvent::new("team", "subPage", Operation::Delete)
            .with_slug("about-us/team")
            .with_parent(EventParent::Document(DocumentSummary::new("about", "subPage")));

        let resolution = resolver(store).resolve(&event).await.expect("resolve");

        assert_eq!(
            resolution.routes.into_strings(),
            vec!["/about-us", "/about-us/team"]
        );
    }

    #[tokio::test]
    async fn deleted_sub_page_without_parent_falls_back_to_every_route() {
        let event = ChangeEvent::new("team", "subPage", Operation::Delete).with_slug("about-us/team");

        let resolution = resolver(site()).resolve(&event).await.expect("resolve");

        assert!(resolution.full_enumeration);
        assert!(resolution.routes.contains("/about-us"));
        assert!(resolution.routes.contains("/about-us/team"));
        assert!(resolution.routes.contains("/posts/my-story"));
    }

    #[tokio::test]
    async fn deleted_top_level_sub_page_only_drops_itself() {
        let event = ChangeEvent::new("faq", "subPage", Operation::Delete)
            .with_slug("faq")
            .with_parent(EventParent::TopLevel);

        let resolution = resolver(site()).resolve(&event).await.expect("resolve");

        assert_eq!(resolution.routes.into_strings(), vec!["/faq"]);
        assert!(!resolution.full_enumeration);
    }

    #[test]
    fn handler_map_respects_priority() {
        let mut config = ResolverConfig::default();
        config.page_kinds.insert("quote".to_string(), PageKind::Post);
        config.global_types.push("quote".to_string());

        let handlers = build_handlers(&config);
        assert_eq!(handlers.get("quote").map(|h| h.name()), Some("module"));
        assert_eq!(handlers.get("siteAlert").map(|h| h.name()), Some("global"));
        assert_eq!(handlers.get("subPage").map(|h| h.name()), Some("sub_page"));
    }
}
