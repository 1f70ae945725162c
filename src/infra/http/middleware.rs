//! Request ids and per-delivery outcome logging for the webhook endpoints.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use metrics::histogram;
use revalidator_types::{Operation, WebhookPayload};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const METRIC_WEBHOOK_MS: &str = "revalidator_webhook_ms";
static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// What a webhook handler learned about the delivery it processed.
///
/// Handlers return it as a response extension; [`log_deliveries`] consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub endpoint: &'static str,
    pub document_id: Option<String>,
    pub document_type: Option<String>,
    pub operation: Option<Operation>,
    pub full_reindex: bool,
}

impl Delivery {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Record what the body claims, before it is validated.
    pub fn note_payload(&mut self, payload: &WebhookPayload) {
        self.document_id = payload.document_id().map(str::to_string);
        self.document_type = payload
            .doc_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        self.operation = payload.operation;
    }
}

/// Tag each request with an id, reusing a sane `x-request-id` from the sender or proxy.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log every webhook delivery with the document it concerned.
///
/// Successful deliveries log at info, rejected ones at warn and upstream failures
/// at error. Requests that never reached a webhook handler only log when they fail.
/// The query string is never logged; it may carry the reindex secret.
pub async fn log_deliveries(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

    let delivery = response.extensions_mut().remove::<Delivery>();
    let endpoint = delivery.as_ref().map(|delivery| delivery.endpoint);
    let document_id = delivery
        .as_ref()
        .and_then(|delivery| delivery.document_id.as_deref());
    let document_type = delivery
        .as_ref()
        .and_then(|delivery| delivery.document_type.as_deref());
    let operation = delivery
        .as_ref()
        .and_then(|delivery| delivery.operation)
        .map(Operation::as_str);
    let full_reindex = delivery.as_ref().is_some_and(|delivery| delivery.full_reindex);

    if let Some(endpoint) = endpoint {
        histogram!(METRIC_WEBHOOK_MS, "endpoint" => endpoint).record(elapsed_ms);
    }

    if !status.is_client_error() && !status.is_server_error() {
        if let Some(endpoint) = endpoint {
            info!(
                target = "revalidator::http::delivery",
                status = status.as_u16(),
                endpoint,
                document_type,
                document_id,
                operation,
                full_reindex,
                elapsed_ms,
                request_id = %request_id,
                "webhook delivery handled",
            );
        }
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "revalidator::http::delivery",
            status = status.as_u16(),
            method = %method,
            path = %path,
            endpoint,
            document_type,
            document_id,
            operation,
            elapsed_ms,
            source,
            detail = %detail,
            chain = ?messages,
            request_id = %request_id,
            "webhook delivery failed",
        );
    } else {
        warn!(
            target = "revalidator::http::delivery",
            status = status.as_u16(),
            method = %method,
            path = %path,
            endpoint,
            document_type,
            document_id,
            operation,
            elapsed_ms,
            source,
            detail = %detail,
            request_id = %request_id,
            "webhook delivery rejected",
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension, Router,
        http::StatusCode,
        middleware::from_fn,
        routing::post,
    };
    use tower::ServiceExt;

    use super::*;

    fn payload(json: &str) -> WebhookPayload {
        serde_json::from_str(json).expect("payload should parse")
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/hook",
                post(|| async {
                    let mut delivery = Delivery::new("revalidate");
                    delivery.document_id = Some("post-1".to_string());
                    (Extension(delivery), StatusCode::OK)
                }),
            )
            .layer(from_fn(log_deliveries))
            .layer(from_fn(set_request_context))
    }

    fn request(request_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/hook");
        if let Some(id) = request_id {
            builder = builder.header("x-request-id", id);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[test]
    fn note_payload_keeps_unvalidated_fields() {
        let mut delivery = Delivery::new("revalidate");
        delivery.note_payload(&payload(
            r#"{"_id":" post-1 ","_type":"  ","operation":"delete"}"#,
        ));

        assert_eq!(delivery.document_id.as_deref(), Some("post-1"));
        assert_eq!(delivery.document_type, None);
        assert_eq!(delivery.operation, Some(Operation::Delete));
    }

    #[tokio::test]
    async fn delivery_is_consumed_and_request_id_echoed() {
        let response = router()
            .oneshot(request(Some("delivery-42")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<Delivery>().is_none());
        assert_eq!(
            response
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok()),
            Some("delivery-42")
        );
    }

    #[tokio::test]
    async fn oversized_request_ids_are_replaced() {
        let oversized = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        let response = router()
            .oneshot(request(Some(oversized.as_str())))
            .await
            .expect("response");

        let echoed = response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .expect("request id header");
        assert_ne!(echoed, oversized);
        assert!(Uuid::parse_str(echoed).is_ok());
    }
}
