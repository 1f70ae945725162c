//! Resolver configuration.
//!
//! Every type list the resolver consults is data passed in at construction,
//! so deployments with a different content schema (and tests with tiny
//! fixtures) do not need code changes.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::domain::documents::DocumentSummary;
use crate::domain::route::Route;
use crate::domain::types::{PageKind, TypeClass};

pub(crate) const DEFAULT_MODULE_TYPES: &[&str] = &[
    "accordion",
    "ctaText",
    "relatedStories",
    "cardGrid",
    "imageGallery",
    "quote",
    "richText",
    "statistics",
    "video",
];
pub(crate) const DEFAULT_GLOBAL_TYPES: &[&str] = &["globalSettings", "siteAlert", "externalLink"];
pub(crate) const DEFAULT_STATIC_ROUTES: &[&str] = &["/", "/search", "/locations"];
pub(crate) const DEFAULT_LOCATIONS_INDEX: &str = "/locations";
pub(crate) const DEFAULT_POST_TYPES: &[&str] = &["post"];
pub(crate) const DEFAULT_TOPIC_PAGE_SIZE: u32 = 12;
pub(crate) const DEFAULT_MAX_HOPS: u32 = 2;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Shared content blocks without a route of their own.
    pub module_types: Vec<String>,
    /// Types whose change can affect every page.
    pub global_types: Vec<String>,
    /// Page-like type tags and the handler kind each dispatches to.
    pub page_kinds: BTreeMap<String, PageKind>,
    /// Fixed routes for singleton types that have no slug.
    pub singleton_routes: BTreeMap<String, Route>,
    /// Routes always included in the full enumeration.
    pub static_routes: Vec<Route>,
    /// Index route refreshed whenever a location changes.
    pub locations_index: Route,
    /// Types counted when paginating a topic's listing.
    pub post_types: Vec<String>,
    pub topic_page_size: NonZeroU32,
    /// Maximum number of reference edges followed away from the changed document.
    pub max_hops: NonZeroU32,
}

pub(crate) fn default_page_kinds() -> BTreeMap<String, PageKind> {
    [
        ("homepage", PageKind::Fixed),
        ("locationHomepage", PageKind::Fixed),
        ("post", PageKind::Post),
        ("location", PageKind::Location),
        ("subPage", PageKind::SubPage),
        ("topic", PageKind::Topic),
    ]
    .into_iter()
    .map(|(tag, kind)| (tag.to_string(), kind))
    .collect()
}

pub(crate) fn default_singleton_routes() -> BTreeMap<String, String> {
    [("homepage", "/"), ("locationHomepage", "/locations")]
        .into_iter()
        .map(|(tag, path)| (tag.to_string(), path.to_string()))
        .collect()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            module_types: to_strings(DEFAULT_MODULE_TYPES),
            global_types: to_strings(DEFAULT_GLOBAL_TYPES),
            page_kinds: default_page_kinds(),
            singleton_routes: default_singleton_routes()
                .into_iter()
                .map(|(tag, path)| (tag, Route::from_path(&path)))
                .collect(),
            static_routes: DEFAULT_STATIC_ROUTES
                .iter()
                .map(|path| Route::from_path(path))
                .collect(),
            locations_index: Route::from_path(DEFAULT_LOCATIONS_INDEX),
            post_types: to_strings(DEFAULT_POST_TYPES),
            topic_page_size: NonZeroU32::new(DEFAULT_TOPIC_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
            max_hops: NonZeroU32::new(DEFAULT_MAX_HOPS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl From<&crate::config::ResolverSettings> for ResolverConfig {
    fn from(settings: &crate::config::ResolverSettings) -> Self {
        Self {
            module_types: settings.module_types.clone(),
            global_types: settings.global_types.clone(),
            page_kinds: settings.page_kinds.clone(),
            singleton_routes: settings
                .singleton_routes
                .iter()
                .map(|(tag, path)| (tag.clone(), Route::from_path(path)))
                .collect(),
            static_routes: settings
                .static_routes
                .iter()
                .map(|path| Route::from_path(path))
                .collect(),
            locations_index: Route::from_path(&settings.locations_index),
            post_types: settings.post_types.clone(),
            topic_page_size: settings.topic_page_size,
            max_hops: settings.max_hops,
        }
    }
}

impl ResolverConfig {
    /// Classify a type tag. Module types win over global types, which win over page kinds.
    pub fn classify(&self, doc_type: &str) -> TypeClass {
        if contains(&self.module_types, doc_type) {
            TypeClass::Module
        } else if contains(&self.global_types, doc_type) {
            TypeClass::Global
        } else if let Some(kind) = self.page_kinds.get(doc_type) {
            TypeClass::Page(*kind)
        } else {
            TypeClass::Unknown
        }
    }

    pub fn is_module(&self, doc_type: &str) -> bool {
        contains(&self.module_types, doc_type)
    }

    pub fn is_global(&self, doc_type: &str) -> bool {
        contains(&self.global_types, doc_type)
    }

    /// Tags of every page kind plus the global types, used for direct-referrer lookups.
    pub fn page_and_global_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .page_kinds
            .keys()
            .filter(|tag| !self.is_module(tag))
            .cloned()
            .collect();
        for tag in &self.global_types {
            if !types.contains(tag) {
                types.push(tag.clone());
            }
        }
        types
    }

    /// Page tags of one kind.
    pub fn tags_of_kind(&self, kind: PageKind) -> Vec<String> {
        self.page_kinds
            .iter()
            .filter(|(tag, candidate)| **candidate == kind && !self.is_module(tag))
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Page tags whose documents are routed by slug: everything but singletons and topics.
    pub fn slug_routed_types(&self) -> Vec<String> {
        self.page_kinds
            .iter()
            .filter(|(tag, kind)| {
                **kind != PageKind::Topic
                    && !self.singleton_routes.contains_key(*tag)
                    && !self.is_module(tag)
            })
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Public route of a page document: the singleton table first, then the slug.
    pub fn route_for(&self, document: &DocumentSummary) -> Option<Route> {
        self.singleton_route(&document.doc_type)
            .or_else(|| document.slug().map(Route::from_path))
    }

    pub fn singleton_route(&self, doc_type: &str) -> Option<Route> {
        self.singleton_routes.get(doc_type).cloned()
    }

    /// Listing routes for a topic with `post_count` referencing posts.
    pub fn topic_routes(&self, topic_route: &Route, post_count: u64) -> Vec<Route> {
        let page_size = u64::from(self.topic_page_size.get());
        let pages = post_count.div_ceil(page_size).max(1);
        (1..=pages).map(|page| topic_route.paginated(page)).collect()
    }
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|candidate| candidate == value)
}

pub(crate) fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_priority() {
        let mut config = ResolverConfig::default();
        assert_eq!(config.classify("ctaText"), TypeClass::Module);
        assert_eq!(config.classify("globalSettings"), TypeClass::Global);
        assert_eq!(config.classify("post"), TypeClass::Page(PageKind::Post));
        assert_eq!(config.classify("mystery"), TypeClass::Unknown);

        // A tag listed both as module and page kind is treated as a module.
        config.page_kinds.insert("ctaText".to_string(), PageKind::Post);
        assert_eq!(config.classify("ctaText"), TypeClass::Module);
    }

    #[test]
    fn singleton_route_wins_over_slug() {
        let config = ResolverConfig::default();
        let home = DocumentSummary::new("home", "homepage").with_slug("ignored");
        assert_eq!(config.route_for(&home), Some(Route::root()));

        let post = DocumentSummary::new("p", "post").with_slug("posts/a");
        assert_eq!(config.route_for(&post), Some(Route::from_path("posts/a")));

        let orphan = DocumentSummary::new("p", "post");
        assert_eq!(config.route_for(&orphan), None);
    }

    #[test]
    fn topic_pagination_rounds_up() {
        let config = ResolverConfig {
            topic_page_size: NonZeroU32::new(10).expect("non-zero"),
            ..Default::default()
        };
        let topic = Route::from_path("topics/news");

        assert_eq!(config.topic_routes(&topic, 0).len(), 1);
        assert_eq!(config.topic_routes(&topic, 10).len(), 1);

        let routes = config.topic_routes(&topic, 21);
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[2].as_str(), "/topics/news/page/3");
    }

    #[test]
    fn slug_routed_types_exclude_singletons_and_topics() {
        let config = ResolverConfig::default();
        let mut types = config.slug_routed_types();
        types.sort();
        assert_eq!(types, vec!["location", "post", "subPage"]);
    }

    #[test]
    fn page_and_global_types_cover_settings() {
        let config = ResolverConfig::default();
        let types = config.page_and_global_types();
        assert!(types.contains(&"globalSettings".to_string()));
        assert!(types.contains(&"homepage".to_string()));
        assert!(!types.contains(&"ctaText".to_string()));
    }
}
