//! Read-only content store seam.
//!
//! The resolver and the search indexer only ever read from the CMS. Every
//! query they need is expressed as one method here so the HTTP client and the
//! in-memory fixture stay interchangeable.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::documents::{DocumentSummary, SearchSource};

pub use memory::{InMemoryContentStore, StoredDocument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content store request failed: {0}")]
    Transport(String),
    #[error("content store returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected content store response: {0}")]
    Decode(String),
    #[error("content store request timed out")]
    Timeout,
}

impl StoreError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Route-relevant fields of one document, including its parent.
    async fn document(&self, id: &str) -> Result<Option<DocumentSummary>, StoreError>;

    /// Documents of the given types holding a direct reference to `target_id`.
    async fn referencing(
        &self,
        target_id: &str,
        types: &[String],
    ) -> Result<Vec<DocumentSummary>, StoreError>;

    /// Every document of the given types.
    async fn documents_of_types(&self, types: &[String])
    -> Result<Vec<DocumentSummary>, StoreError>;

    /// Number of documents of the given types referencing `target_id`.
    async fn count_referencing(&self, target_id: &str, types: &[String])
    -> Result<u64, StoreError>;

    async fn search_source(&self, id: &str) -> Result<Option<SearchSource>, StoreError>;

    async fn search_sources(&self, types: &[String]) -> Result<Vec<SearchSource>, StoreError>;
}
