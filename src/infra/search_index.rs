//! Full-text search index client using the batch write API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use revalidator_types::SearchRecord;
use serde::Serialize;
use tracing::debug;

use crate::application::indexing::{SearchIndex, SearchIndexError};
use crate::config::SearchBackendSettings;

use super::content_store::user_agent;
use super::error::{InfraError, Upstream};

const APPLICATION_ID_HEADER: &str = "x-algolia-application-id";
const API_KEY_HEADER: &str = "x-algolia-api-key";

#[derive(Serialize)]
#[serde(tag = "action", content = "body", rename_all = "camelCase")]
enum BatchRequest<'a> {
    UpdateObject(&'a SearchRecord),
    DeleteObject(ObjectRef<'a>),
}

#[derive(Serialize)]
struct ObjectRef<'a> {
    #[serde(rename = "objectID")]
    object_id: &'a str,
}

#[derive(Serialize)]
struct Batch<'a> {
    requests: Vec<BatchRequest<'a>>,
}

#[derive(Debug, Clone)]
pub struct HttpSearchIndex {
    client: Client,
    batch_url: Url,
    application_id: String,
    api_key: String,
}

impl HttpSearchIndex {
    pub fn new(backend: &SearchBackendSettings, timeout: Duration) -> Result<Self, InfraError> {
        let batch_url = backend
            .base_url
            .join(&format!("1/indexes/{}/batch", backend.index_name))
            .map_err(InfraError::endpoint(Upstream::SearchIndex))?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(InfraError::client(Upstream::SearchIndex))?;

        Ok(Self {
            client,
            batch_url,
            application_id: backend.application_id.clone(),
            api_key: backend.api_key.clone(),
        })
    }

    async fn send(&self, batch: Batch<'_>) -> Result<(), SearchIndexError> {
        let operations = batch.requests.len();
        let response = self
            .client
            .post(self.batch_url.clone())
            .header(APPLICATION_ID_HEADER, &self.application_id)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&batch)
            .send()
            .await
            .map_err(|err| SearchIndexError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::Status {
                status: status.as_u16(),
                message,
            });
        }
        debug!(target = "revalidator::search_index", operations, "search batch accepted");
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn upsert(&self, records: &[SearchRecord]) -> Result<(), SearchIndexError> {
        if records.is_empty() {
            return Ok(());
        }
        self.send(Batch {
            requests: records.iter().map(BatchRequest::UpdateObject).collect(),
        })
        .await
    }

    async fn delete(&self, object_ids: &[String]) -> Result<(), SearchIndexError> {
        if object_ids.is_empty() {
            return Ok(());
        }
        self.send(Batch {
            requests: object_ids
                .iter()
                .map(|id| BatchRequest::DeleteObject(ObjectRef { object_id: id }))
                .collect(),
        })
        .await
    }
}
