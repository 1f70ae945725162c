use std::sync::Arc;

use crate::application::indexing::SearchIndexer;
use crate::application::revalidation::RevalidationService;
use crate::application::signature::SignatureVerifier;

/// Shared, immutable state behind the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub verifier: Arc<SignatureVerifier>,
    pub revalidation: Arc<RevalidationService>,
    /// `None` when no search backend is configured.
    pub indexer: Option<Arc<SearchIndexer>>,
    pub reindex_secret: Option<Arc<str>>,
    pub signature_header: Arc<str>,
    pub operation_header: Arc<str>,
}
