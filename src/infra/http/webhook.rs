//! Signed webhook endpoints: route revalidation and search indexing.

use std::borrow::Cow;

use axum::{
    Extension,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use metrics::counter;
use revalidator_types::{Operation, WebhookPayload};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::info;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::indexing::{IndexOutcome, IndexingError};
use crate::application::resolver::ResolveError;
use crate::application::revalidation::RevalidationError;
use crate::application::signature::SignatureError;
use crate::domain::event::ChangeEvent;

use super::middleware::Delivery;
use super::state::WebhookState;

const METRIC_WEBHOOK_REQUESTS: &str = "revalidator_webhook_requests_total";
const SOURCE: &str = "infra::http::webhook";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("invalid webhook body: {0}")]
    InvalidEvent(String),
    #[error(transparent)]
    Revalidation(#[from] RevalidationError),
    #[error(transparent)]
    Indexing(#[from] IndexingError),
    #[error("search indexing is not configured")]
    SearchDisabled,
    #[error("reindex secret does not match")]
    ReindexSecret,
}

impl WebhookError {
    fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::Signature(_) | WebhookError::ReindexSecret => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidEvent(_)
            | WebhookError::Revalidation(RevalidationError::Resolve(
                ResolveError::InvalidEvent(_),
            )) => StatusCode::BAD_REQUEST,
            WebhookError::SearchDisabled => StatusCode::NOT_FOUND,
            WebhookError::Revalidation(_) | WebhookError::Indexing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn outcome(&self) -> &'static str {
        match self.status() {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::BAD_REQUEST => "invalid",
            StatusCode::NOT_FOUND => "disabled",
            _ => "failed",
        }
    }
}

impl From<WebhookError> for HttpError {
    fn from(err: WebhookError) -> Self {
        let status = err.status();
        let public_message: Cow<'static, str> = match &err {
            WebhookError::Signature(_) => "Invalid signature".into(),
            WebhookError::ReindexSecret => "Invalid reindex secret".into(),
            WebhookError::SearchDisabled => "Search indexing is not configured".into(),
            WebhookError::InvalidEvent(_) => err.to_string().into(),
            WebhookError::Revalidation(_) | WebhookError::Indexing(_) => {
                ErrorReport::from_error(SOURCE, status, &err)
                    .messages
                    .join(": ")
                    .into()
            }
        };
        HttpError::from_error(SOURCE, status, public_message, &err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        HttpError::from(self).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SearchIndexQuery {
    initial: Option<String>,
}

type Handled = (Extension<Delivery>, Result<String, WebhookError>);

pub(super) async fn revalidate(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Handled {
    let mut delivery = Delivery::new("revalidate");
    let result = revalidate_document(&state, &headers, &body, &mut delivery).await;
    record(delivery.endpoint, &result);
    (Extension(delivery), result)
}

async fn revalidate_document(
    state: &WebhookState,
    headers: &HeaderMap,
    body: &[u8],
    delivery: &mut Delivery,
) -> Result<String, WebhookError> {
    let event = change_event(state, headers, body, delivery)?;
    let summary = state.revalidation.revalidate(&event).await?;
    Ok(summary.to_plain_text())
}

pub(super) async fn search_index(
    State(state): State<WebhookState>,
    Query(query): Query<SearchIndexQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Handled {
    let mut delivery = Delivery::new("search_index");
    let result = index_document(
        &state,
        query.initial.as_deref(),
        &headers,
        &body,
        &mut delivery,
    )
    .await;
    record(delivery.endpoint, &result);
    (Extension(delivery), result)
}

async fn index_document(
    state: &WebhookState,
    initial: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
    delivery: &mut Delivery,
) -> Result<String, WebhookError> {
    let indexer = state
        .indexer
        .as_ref()
        .ok_or(WebhookError::SearchDisabled)?;

    if let Some(candidate) = initial {
        delivery.full_reindex = true;
        let expected = state
            .reindex_secret
            .as_deref()
            .ok_or(WebhookError::ReindexSecret)?;
        if !bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(WebhookError::ReindexSecret);
        }
        let count = indexer.reindex_all().await?;
        info!(target = "revalidator::http::webhook", records = count, "full reindex finished");
        return Ok(format!("Indexed {count} record(s)"));
    }

    let event = change_event(state, headers, body, delivery)?;
    let message = match indexer.index_event(&event).await? {
        IndexOutcome::Upserted(record) => {
            format!("Indexed {} {}", record.doc_type, record.object_id)
        }
        IndexOutcome::Removed(id) => format!("Removed {id} from the search index"),
        IndexOutcome::Skipped { doc_type } => {
            format!("Skipped {doc_type} {}: type is not indexed", event.document_id)
        }
    };
    Ok(message)
}

/// Verify the signature over the raw body, then parse the delivery.
///
/// `delivery` is filled in as far as parsing gets so rejections can be logged
/// with the document they concerned.
fn change_event(
    state: &WebhookState,
    headers: &HeaderMap,
    body: &[u8],
    delivery: &mut Delivery,
) -> Result<ChangeEvent, WebhookError> {
    let signature = headers
        .get(&*state.signature_header)
        .map(|value| value.to_str().map_err(|_| SignatureError::Malformed))
        .transpose()?;
    state.verifier.verify(signature, body)?;

    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|err| WebhookError::invalid_event(err.to_string()))?;
    delivery.note_payload(&payload);

    let header_operation = match headers.get(&*state.operation_header) {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| WebhookError::invalid_event("operation header is not valid text"))?;
            Some(
                raw.parse::<Operation>()
                    .map_err(|err| WebhookError::invalid_event(err.to_string()))?,
            )
        }
        None => None,
    };

    let event = ChangeEvent::from_payload(&payload, header_operation)
        .map_err(|err| WebhookError::invalid_event(err.to_string()))?;
    delivery.operation = Some(event.operation);
    Ok(event)
}

fn record<T>(endpoint: &'static str, result: &Result<T, WebhookError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => err.outcome(),
    };
    counter!(METRIC_WEBHOOK_REQUESTS, "endpoint" => endpoint, "outcome" => outcome).increment(1);
}
