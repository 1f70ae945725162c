//! Search indexing: turns CMS documents into flattened search records.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use revalidator_types::SearchRecord;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::documents::{DocumentSummary, SearchSource};
use crate::domain::event::ChangeEvent;

use super::resolver::ResolverConfig;
use super::store::{ContentStore, StoreError};

const METRIC_SEARCH_INDEXED: &str = "revalidator_search_records_total";

#[derive(Debug, Error)]
pub enum SearchIndexError {
    #[error("search index request failed: {0}")]
    Transport(String),
    #[error("search index returned status {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("content store query failed")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Index(#[from] SearchIndexError),
}

/// Write side of a full-text search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, records: &[SearchRecord]) -> Result<(), SearchIndexError>;

    async fn delete(&self, object_ids: &[String]) -> Result<(), SearchIndexError>;
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub indexable_types: Vec<String>,
    pub body_max_chars: usize,
    pub batch_size: NonZeroUsize,
}

/// What happened to one changed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Upserted(SearchRecord),
    Removed(String),
    Skipped { doc_type: String },
}

pub struct SearchIndexer {
    store: Arc<dyn ContentStore>,
    index: Arc<dyn SearchIndex>,
    routes: Arc<ResolverConfig>,
    config: IndexerConfig,
}

impl SearchIndexer {
    pub fn new(
        store: Arc<dyn ContentStore>,
        index: Arc<dyn SearchIndex>,
        routes: Arc<ResolverConfig>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            store,
            index,
            routes,
            config,
        }
    }

    fn is_indexable(&self, doc_type: &str) -> bool {
        self.config
            .indexable_types
            .iter()
            .any(|candidate| candidate == doc_type)
    }

    /// Mirror one changed document into the index.
    ///
    /// Deletes, and documents that no longer exist, remove the record.
    #[instrument(skip(self, event), fields(document_id = %event.document_id))]
    pub async fn index_event(&self, event: &ChangeEvent) -> Result<IndexOutcome, IndexingError> {
        if !self.is_indexable(&event.document_type) {
            return Ok(IndexOutcome::Skipped {
                doc_type: event.document_type.clone(),
            });
        }

        let source = if event.is_delete() {
            None
        } else {
            self.store.search_source(&event.document_id).await?
        };

        let outcome = match source {
            Some(source) => {
                let record = self.to_record(&source);
                self.index.upsert(std::slice::from_ref(&record)).await?;
                counter!(METRIC_SEARCH_INDEXED, "action" => "upsert").increment(1);
                IndexOutcome::Upserted(record)
            }
            None => {
                self.index
                    .delete(std::slice::from_ref(&event.document_id))
                    .await?;
                counter!(METRIC_SEARCH_INDEXED, "action" => "delete").increment(1);
                IndexOutcome::Removed(event.document_id.clone())
            }
        };
        Ok(outcome)
    }

    /// Push every indexable document, in batches. Returns the record count.
    pub async fn reindex_all(&self) -> Result<usize, IndexingError> {
        let sources = self
            .store
            .search_sources(&self.config.indexable_types)
            .await?;
        let records: Vec<SearchRecord> = sources.iter().map(|s| self.to_record(s)).collect();

        for batch in records.chunks(self.config.batch_size.get()) {
            self.index.upsert(batch).await?;
        }

        counter!(METRIC_SEARCH_INDEXED, "action" => "reindex").increment(records.len() as u64);
        info!(
            target = "revalidator::indexing",
            records = records.len(),
            batch_size = self.config.batch_size.get(),
            "full reindex complete"
        );
        Ok(records.len())
    }

    pub fn to_record(&self, source: &SearchSource) -> SearchRecord {
        let summary = DocumentSummary {
            id: source.id.clone(),
            doc_type: source.doc_type.clone(),
            slug: source.slug.clone(),
            parent: None,
        };
        let body = source
            .body
            .as_ref()
            .map(flatten_portable_text)
            .unwrap_or_default();

        SearchRecord {
            object_id: source.id.clone(),
            doc_type: source.doc_type.clone(),
            title: source.title.clone().unwrap_or_default(),
            route: self.routes.route_for(&summary).map(|route| route.into_string()),
            description: source.description.clone(),
            body: truncate_chars(body, self.config.body_max_chars),
            updated_at: source.updated_at.clone(),
        }
    }
}

/// Plain text of a portable-text value: span text of each block, blocks
/// separated by a blank line. Non-text blocks are dropped.
pub fn flatten_portable_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(block_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::Object(_) => block_text(value).unwrap_or_default(),
        _ => String::new(),
    }
}

fn block_text(block: &Value) -> Option<String> {
    if block.get("_type").and_then(Value::as_str) != Some("block") {
        return None;
    }
    let children = block.get("children")?.as_array()?;
    let text: String = children
        .iter()
        .filter_map(|span| span.get("text").and_then(Value::as_str))
        .collect();
    Some(text.trim().to_string())
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
    text
}
