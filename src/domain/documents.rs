//! Read-only projections of CMS documents.

use serde::Deserialize;
use serde_json::Value;

/// Minimal view of a document needed to compute its route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent: Option<Box<DocumentSummary>>,
}

impl DocumentSummary {
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            slug: None,
            parent: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_parent(mut self, parent: DocumentSummary) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Slug with blank values treated as absent.
    pub fn slug(&self) -> Option<&str> {
        self.slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
    }
}

/// Document fields used to build a search record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchSource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Portable-text block array, kept as raw JSON.
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(rename = "_updatedAt", default)]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_parses_nested_parent() {
        let summary: DocumentSummary = serde_json::from_str(
            r#"{"_id":"sp-2","_type":"subPage","slug":"about/team",
                "parent":{"_id":"sp-1","_type":"subPage","slug":"about"}}"#,
        )
        .expect("summary should parse");

        let parent = summary.parent.as_deref().expect("parent");
        assert_eq!(parent.slug(), Some("about"));
        assert_eq!(summary.slug(), Some("about/team"));
    }

    #[test]
    fn blank_slug_is_absent() {
        let summary = DocumentSummary::new("x", "post").with_slug("  ");
        assert_eq!(summary.slug(), None);
    }
}
