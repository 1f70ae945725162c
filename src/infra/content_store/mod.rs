//! HTTP client for the CMS query API.

mod queries;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::application::store::{ContentStore, StoreError};
use crate::config::ContentStoreSettings;
use crate::domain::documents::{DocumentSummary, SearchSource};

use super::error::{InfraError, Upstream};

#[derive(Debug, Clone)]
pub struct HttpContentStore {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpContentStore {
    pub fn new(settings: &ContentStoreSettings) -> Result<Self, InfraError> {
        let endpoint = query_endpoint(settings)?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(InfraError::client(Upstream::ContentStore))?;

        Ok(Self {
            client,
            endpoint,
            token: settings.token.clone(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[(&str, Value)],
    ) -> Result<T, StoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            for (name, value) in params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let mut envelope: Value = serde_json::from_slice(&bytes).map_err(StoreError::decode)?;
        let result = envelope
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| StoreError::decode("response has no `result` field"))?;

        debug!(target = "revalidator::content_store", query, "content store query answered");
        serde_json::from_value(result).map_err(StoreError::decode)
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(err.to_string())
    }
}

fn query_endpoint(settings: &ContentStoreSettings) -> Result<Url, InfraError> {
    let path = format!(
        "v{}/data/query/{}",
        settings.api_version.trim_start_matches('v'),
        settings.dataset
    );
    let mut base = settings.base_url.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(&path)
        .map_err(InfraError::endpoint(Upstream::ContentStore))
}

pub(crate) fn user_agent() -> &'static str {
    concat!("revalidator/", env!("CARGO_PKG_VERSION"))
}

fn types_param(types: &[String]) -> Value {
    Value::from(types.to_vec())
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn document(&self, id: &str) -> Result<Option<DocumentSummary>, StoreError> {
        self.query(&queries::document(), &[("id", Value::from(id))])
            .await
    }

    async fn referencing(
        &self,
        target_id: &str,
        types: &[String],
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        self.query(
            &queries::referencing(),
            &[("id", Value::from(target_id)), ("types", types_param(types))],
        )
        .await
    }

    async fn documents_of_types(
        &self,
        types: &[String],
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        self.query(&queries::documents_of_types(), &[("types", types_param(types))])
            .await
    }

    async fn count_referencing(
        &self,
        target_id: &str,
        types: &[String],
    ) -> Result<u64, StoreError> {
        if types.is_empty() {
            return Ok(0);
        }
        self.query(
            &queries::count_referencing(),
            &[("id", Value::from(target_id)), ("types", types_param(types))],
        )
        .await
    }

    async fn search_source(&self, id: &str) -> Result<Option<SearchSource>, StoreError> {
        self.query(&queries::search_source(), &[("id", Value::from(id))])
            .await
    }

    async fn search_sources(&self, types: &[String]) -> Result<Vec<SearchSource>, StoreError> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        self.query(&queries::search_sources(), &[("types", types_param(types))])
            .await
    }
}
