//! Change events delivered by the content store.

use revalidator_types::{Operation, ParentField, WebhookPayload};

use super::documents::DocumentSummary;
use super::error::DomainError;

/// What the delivery said about the changed document's parent page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventParent {
    /// The projection did not include a parent.
    #[default]
    Unreported,
    /// The document sits at the top level.
    TopLevel,
    Document(DocumentSummary),
}

/// One changed document, as reported by the webhook sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub document_id: String,
    pub document_type: String,
    pub operation: Operation,
    /// Slug carried by the delivery; the only source of a deleted document's route.
    pub slug: Option<String>,
    pub parent: EventParent,
}

impl ChangeEvent {
    pub fn new(
        document_id: impl Into<String>,
        document_type: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            document_type: document_type.into(),
            operation,
            slug: None,
            parent: EventParent::Unreported,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_parent(mut self, parent: EventParent) -> Self {
        self.parent = parent;
        self
    }

    /// The changed document as far as the delivery describes it.
    ///
    /// Used when the store no longer holds the document, e.g. after a delete.
    pub fn reported_document(&self) -> DocumentSummary {
        let mut document = DocumentSummary::new(&self.document_id, &self.document_type);
        if let Some(slug) = &self.slug {
            document = document.with_slug(slug);
        }
        if let EventParent::Document(parent) = &self.parent {
            document = document.with_parent(parent.clone());
        }
        document
    }

    /// Build an event from a webhook body.
    ///
    /// `header_operation` is used when the body does not name the operation;
    /// with neither present the change is treated as an update.
    pub fn from_payload(
        payload: &WebhookPayload,
        header_operation: Option<Operation>,
    ) -> Result<Self, DomainError> {
        let document_id = payload
            .document_id()
            .ok_or_else(|| DomainError::validation("webhook body is missing `_id`"))?;

        let document_type = payload
            .doc_type
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        Ok(Self {
            document_id: document_id.to_string(),
            document_type: document_type.to_string(),
            operation: payload
                .operation
                .or(header_operation)
                .unwrap_or_default(),
            slug: payload.slug_value().map(str::to_string),
            parent: match &payload.parent {
                None => EventParent::Unreported,
                Some(None) => EventParent::TopLevel,
                Some(Some(parent)) => parent_summary(parent, document_type)?,
            },
        })
    }

    pub fn is_delete(&self) -> bool {
        self.operation == Operation::Delete
    }
}

/// Parents without their own `_type` share the child's type.
fn parent_summary(parent: &ParentField, child_type: &str) -> Result<EventParent, DomainError> {
    let id = parent
        .id()
        .ok_or_else(|| DomainError::validation("webhook body has a `parent` without `_id`"))?;
    let mut summary = DocumentSummary::new(id, parent.doc_type().unwrap_or(child_type));
    if let Some(slug) = parent.slug_value() {
        summary = summary.with_slug(slug);
    }
    Ok(EventParent::Document(summary))
}
