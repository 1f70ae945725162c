//! Query expressions sent to the CMS query API.
//!
//! Ids and type lists are always bound as `$id` / `$types` parameters.

/// Projection shared by every route-oriented query.
const SUMMARY: &str = r#"{_id, _type, "slug": slug.current, "parent": parent->{_id, _type, "slug": slug.current}}"#;

const SEARCH: &str = r#"{_id, _type, title, "slug": slug.current, description, body, _updatedAt}"#;

/// Published documents only; drafts live under the `drafts.` id prefix.
const PUBLISHED: &str = r#"!(_id in path("drafts.**"))"#;

pub(crate) fn document() -> String {
    format!("*[_id == $id][0]{SUMMARY}")
}

pub(crate) fn referencing() -> String {
    format!("*[_type in $types && references($id) && {PUBLISHED}]{SUMMARY}")
}

pub(crate) fn documents_of_types() -> String {
    format!("*[_type in $types && {PUBLISHED}]{SUMMARY}")
}

pub(crate) fn count_referencing() -> String {
    format!("count(*[_type in $types && references($id) && {PUBLISHED}])")
}

pub(crate) fn search_source() -> String {
    format!("*[_id == $id][0]{SEARCH}")
}

pub(crate) fn search_sources() -> String {
    format!("*[_type in $types && {PUBLISHED}]{SEARCH}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_bind_parameters() {
        for query in [referencing(), count_referencing()] {
            assert!(query.contains("references($id)"));
            assert!(query.contains("_type in $types"));
        }
        assert!(document().starts_with("*[_id == $id][0]"));
    }
}
