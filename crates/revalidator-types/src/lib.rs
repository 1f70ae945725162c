//! Wire types for the revalidator webhooks.
//!
//! These mirror the JSON bodies exchanged with the CMS webhook sender and the
//! search index, so both the service and tooling that replays deliveries can
//! share one definition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Body delivered by the CMS webhook.
///
/// Only `_id` is mandatory for processing; everything else is optional so a
/// malformed delivery can still be parsed and rejected with a precise error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookPayload {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub slug: Option<SlugField>,
    #[serde(default)]
    pub operation: Option<Operation>,
    /// `None` when the projection omits `parent`, `Some(None)` when it is `null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<Option<ParentField>>,
}

impl WebhookPayload {
    /// Trimmed document id, `None` when absent or blank.
    pub fn document_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn slug_value(&self) -> Option<&str> {
        self.slug.as_ref().and_then(SlugField::value)
    }
}

/// Parent page of a nested document, projected as a bare id or as `{ _id, _type, slug }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParentField {
    Id(String),
    Document {
        #[serde(rename = "_id", alias = "_ref")]
        id: String,
        #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
        doc_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slug: Option<SlugField>,
    },
}

impl ParentField {
    /// Trimmed parent id, `None` when blank.
    pub fn id(&self) -> Option<&str> {
        let raw = match self {
            ParentField::Id(id) | ParentField::Document { id, .. } => id.as_str(),
        };
        Some(raw.trim()).filter(|id| !id.is_empty())
    }

    pub fn doc_type(&self) -> Option<&str> {
        match self {
            ParentField::Id(_) => None,
            ParentField::Document { doc_type, .. } => doc_type
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty()),
        }
    }

    pub fn slug_value(&self) -> Option<&str> {
        match self {
            ParentField::Id(_) => None,
            ParentField::Document { slug, .. } => slug.as_ref().and_then(SlugField::value),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Slugs arrive either as a bare string or as the CMS slug object `{ "current": "…" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SlugField {
    Plain(String),
    Object {
        #[serde(default)]
        current: Option<String>,
    },
}

impl SlugField {
    pub fn value(&self) -> Option<&str> {
        let raw = match self {
            SlugField::Plain(value) => Some(value.as_str()),
            SlugField::Object { current } => current.as_deref(),
        };
        raw.map(str::trim).filter(|value| !value.is_empty())
    }
}

/// Kind of change reported by the CMS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    #[default]
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl fmt::Display for UnknownOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown operation `{}`", self.0)
    }
}

impl std::error::Error for UnknownOperation {}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

/// Outcome of one revalidation webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevalidationSummary {
    pub document_id: String,
    pub document_type: String,
    pub routes: Vec<String>,
}

impl RevalidationSummary {
    /// Plain-text body returned to the webhook sender.
    pub fn to_plain_text(&self) -> String {
        let mut text = format!(
            "Revalidated {} route(s) for {} {}",
            self.routes.len(),
            self.document_type,
            self.document_id
        );
        for route in &self.routes {
            text.push('\n');
            text.push_str(route);
        }
        text
    }
}

/// Flattened document pushed to the full-text search index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SearchRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub title: String,
    pub route: Option<String>,
    pub description: Option<String>,
    pub body: String,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}
