//! Public route paths and deduplicated route sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Normalized public URL path: a single leading `/`, no trailing `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    /// Site root.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Build a route from a CMS slug or a configured path.
    ///
    /// Surrounding whitespace and slashes are ignored and repeated slashes
    /// collapse, so `posts/my-story`, `/posts/my-story/` and
    /// `posts//my-story` all map to `/posts/my-story`.
    pub fn from_path(raw: &str) -> Self {
        let segments: Vec<&str> = raw
            .trim()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        if segments.is_empty() {
            return Self::root();
        }
        Self(format!("/{}", segments.join("/")))
    }

    /// Route of listing page `page` (1-based) under this route.
    ///
    /// Page 1 is the route itself; later pages append `/page/{n}`.
    pub fn paginated(&self, page: u64) -> Self {
        if page <= 1 {
            return self.clone();
        }
        if self.0 == "/" {
            return Self(format!("/page/{page}"));
        }
        Self(format!("{}/page/{page}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplicated, deterministically ordered set of routes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSet {
    routes: BTreeSet<Route>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the route was not already present.
    pub fn insert(&mut self, route: Route) -> bool {
        self.routes.insert(route)
    }

    pub fn merge(&mut self, other: RouteSet) {
        self.routes.extend(other.routes);
    }

    pub fn contains(&self, route: &str) -> bool {
        self.routes.iter().any(|candidate| candidate.as_str() == route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn into_strings(self) -> Vec<String> {
        self.routes.into_iter().map(Route::into_string).collect()
    }
}

impl FromIterator<Route> for RouteSet {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

impl Extend<Route> for RouteSet {
    fn extend<I: IntoIterator<Item = Route>>(&mut self, iter: I) {
        self.routes.extend(iter);
    }
}

impl IntoIterator for RouteSet {
    type Item = Route;
    type IntoIter = std::collections::btree_set::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}
