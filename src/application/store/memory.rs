//! In-memory content store used as a fixture by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::documents::{DocumentSummary, SearchSource};

use super::{ContentStore, StoreError};

/// A document plus its outgoing references.
///
/// A `parent` link counts as a reference, matching how the CMS reports
/// `references()` for hierarchical pages.
#[derive(Debug, Clone, Default)]
pub struct StoredDocument {
    pub id: String,
    pub doc_type: String,
    pub slug: Option<String>,
    pub parent: Option<String>,
    pub references: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<Value>,
    pub updated_at: Option<String>,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            ..Default::default()
        }
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent = Some(parent_id.into());
        self
    }

    pub fn references<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn refers_to(&self, target_id: &str) -> bool {
        self.parent.as_deref() == Some(target_id)
            || self.references.iter().any(|id| id == target_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    documents: BTreeMap<String, StoredDocument>,
    queries: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, document: StoredDocument) -> Self {
        self.documents.insert(document.id.clone(), document);
        self
    }

    /// Make every subsequent query fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of queries answered or rejected so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn begin_query(&self) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("in-memory store set to fail".to_string()));
        }
        Ok(())
    }

    fn summary(&self, document: &StoredDocument, depth: usize) -> DocumentSummary {
        // Parents are projected one level deep, like the HTTP query.
        let parent = match (&document.parent, depth) {
            (Some(parent_id), 0) => self
                .documents
                .get(parent_id)
                .map(|parent| Box::new(self.summary(parent, depth + 1))),
            _ => None,
        };

        DocumentSummary {
            id: document.id.clone(),
            doc_type: document.doc_type.clone(),
            slug: document.slug.clone(),
            parent,
        }
    }

    fn search_view(document: &StoredDocument) -> SearchSource {
        SearchSource {
            id: document.id.clone(),
            doc_type: document.doc_type.clone(),
            title: document.title.clone(),
            slug: document.slug.clone(),
            description: document.description.clone(),
            body: document.body.clone(),
            updated_at: document.updated_at.clone(),
        }
    }

    fn of_types<'a>(&'a self, types: &'a [String]) -> impl Iterator<Item = &'a StoredDocument> {
        self.documents
            .values()
            .filter(move |document| types.iter().any(|t| *t == document.doc_type))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn document(&self, id: &str) -> Result<Option<DocumentSummary>, StoreError> {
        self.begin_query()?;
        Ok(self
            .documents
            .get(id)
            .map(|document| self.summary(document, 0)))
    }

    async fn referencing(
        &self,
        target_id: &str,
        types: &[String],
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        self.begin_query()?;
        Ok(self
            .of_types(types)
            .filter(|document| document.refers_to(target_id))
            .map(|document| self.summary(document, 0))
            .collect())
    }

    async fn documents_of_types(
        &self,
        types: &[String],
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        self.begin_query()?;
        Ok(self
            .of_types(types)
            .map(|document| self.summary(document, 0))
            .collect())
    }

    async fn count_referencing(
        &self,
        target_id: &str,
        types: &[String],
    ) -> Result<u64, StoreError> {
        self.begin_query()?;
        Ok(self
            .of_types(types)
            .filter(|document| document.refers_to(target_id))
            .count() as u64)
    }

    async fn search_source(&self, id: &str) -> Result<Option<SearchSource>, StoreError> {
        self.begin_query()?;
        Ok(self.documents.get(id).map(Self::search_view))
    }

    async fn search_sources(&self, types: &[String]) -> Result<Vec<SearchSource>, StoreError> {
        self.begin_query()?;
        Ok(self.of_types(types).map(Self::search_view).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn parent_link_counts_as_reference() {
        let store = InMemoryContentStore::new()
            .with(StoredDocument::new("about", "subPage").slug("about"))
            .with(
                StoredDocument::new("team", "subPage")
                    .slug("about/team")
                    .parent("about"),
            );

        let hits = store
            .referencing("about", &types(&["subPage"]))
            .await
            .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "team");
        assert_eq!(
            hits[0].parent.as_deref().and_then(DocumentSummary::slug),
            Some("about")
        );
    }

    #[tokio::test]
    async fn failing_store_counts_queries() {
        let store = InMemoryContentStore::new();
        store.set_failing(true);

        let err = store.document("x").await.expect_err("should fail");
        assert!(matches!(err, StoreError::Transport(_)));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn count_filters_by_type() {
        let store = InMemoryContentStore::new()
            .with(StoredDocument::new("topic-1", "topic").slug("topics/news"))
            .with(StoredDocument::new("p1", "post").references(["topic-1"]))
            .with(StoredDocument::new("p2", "post").references(["topic-1"]))
            .with(StoredDocument::new("l1", "location").references(["topic-1"]));

        let count = store
            .count_referencing("topic-1", &types(&["post"]))
            .await
            .expect("count");
        assert_eq!(count, 2);
    }
}
