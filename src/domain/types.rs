//! Shared domain enumerations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Route behaviour of a page-like document type.
///
/// The mapping from CMS type tags to kinds lives in configuration; the kind
/// selects the handler that computes the document's stale routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Singleton page served from a fixed route.
    Fixed,
    Post,
    Location,
    SubPage,
    Topic,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Fixed => "fixed",
            PageKind::Post => "post",
            PageKind::Location => "location",
            PageKind::SubPage => "sub_page",
            PageKind::Topic => "topic",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a changed document type is classified before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Module,
    Global,
    Page(PageKind),
    Unknown,
}

impl TypeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeClass::Module => "module",
            TypeClass::Global => "global",
            TypeClass::Page(kind) => kind.as_str(),
            TypeClass::Unknown => "unknown",
        }
    }
}
