//! Bucket counts per distinct value of a field.

use serde_json::{Value, json};

use super::{Facet, FacetState, search_query};
use crate::error::DatagridResult;
use crate::proxy_query::ProxyQuery;
use crate::value::Options;

/// `terms` aggregation on option `field` (the facet name when unset).
/// Option `size` caps the number of buckets.
#[derive(Debug, Default)]
pub struct TermsFacet {
    state: FacetState,
}

impl Facet for TermsFacet {
    fn state(&self) -> &FacetState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FacetState {
        &mut self.state
    }

    fn facet_type(&self) -> &'static str {
        "terms"
    }

    fn default_options(&self) -> Options {
        let mut options = Options::new();
        options.insert("field".to_string(), json!(""));
        options
    }

    fn apply(&self, query: &mut ProxyQuery) -> DatagridResult<()> {
        let field = self
            .option("field")
            .and_then(Value::as_str)
            .filter(|field| !field.is_empty())
            .unwrap_or_else(|| self.name());

        let mut terms = json!({"field": field});
        if let Some(size) = self.option("size").and_then(Value::as_u64) {
            terms["size"] = json!(size);
        }

        let name = self.name().to_string();
        search_query(self, query)?.add_facet(name, json!({"terms": terms}));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::{SearchClient, SearchResponse, SqlExecutor};
    use crate::proxy_query::{RelationalQuery, SearchQuery};
    use crate::value::Row;
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Nothing;

    #[async_trait]
    impl SearchClient for Nothing {
        async fn search(&self, _index: &str, _body: &Value) -> DatagridResult<SearchResponse> {
            Ok(SearchResponse::default())
        }
    }

    #[async_trait]
    impl SqlExecutor for Nothing {
        async fn fetch_rows(&self, _sql: &str) -> DatagridResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn fetch_count(&self, _sql: &str) -> DatagridResult<i64> {
            Ok(0)
        }
    }

    #[test]
    fn adds_terms_aggregation() {
        let mut facet = TermsFacet::default();
        facet.initialize("tags", json!({"field": "tags.keyword", "size": 5}).as_object().cloned().unwrap());

        let mut query: ProxyQuery = SearchQuery::new("articles", Arc::new(Nothing)).into();
        facet.apply(&mut query).unwrap();

        assert_eq!(
            query.as_search().unwrap().facets(),
            &[(
                "tags".to_string(),
                json!({"terms": {"field": "tags.keyword", "size": 5}})
            )]
        );
    }

    #[test]
    fn field_defaults_to_name() {
        let mut facet = TermsFacet::default();
        facet.initialize("category", Options::new());

        let mut query: ProxyQuery = SearchQuery::new("articles", Arc::new(Nothing)).into();
        facet.apply(&mut query).unwrap();
        assert_eq!(
            query.as_search().unwrap().facets()[0].1,
            json!({"terms": {"field": "category"}})
        );
    }

    #[test]
    fn relational_query_is_rejected() {
        let mut facet = TermsFacet::default();
        facet.initialize("tags", Options::new());

        let mut query: ProxyQuery = RelationalQuery::new("post", Arc::new(Nothing)).into();
        let err = facet.apply(&mut query).unwrap_err();
        assert!(err.to_string().contains("requires the search engine"));
    }
}
