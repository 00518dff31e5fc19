//! Search engine proxy query.
//!
//! The native builder is the request body itself. Filters and facets
//! contributed by the datagrid are kept beside it and folded in only when
//! the request is prepared, so the base query is never mutated.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::QueryState;
use crate::backend::SearchClient;
use crate::error::{DatagridError, DatagridResult};
use crate::value::Row;

fn match_all() -> Value {
    json!({"match_all": {}})
}

/// An Elasticsearch-style `_search` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default = "match_all")]
    pub query: Value,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub aggs: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_total_hits: Option<bool>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: match_all(),
            sort: Vec::new(),
            from: None,
            size: None,
            aggs: Map::new(),
            track_total_hits: None,
        }
    }
}

impl SearchRequest {
    /// A request running the given query.
    pub fn new(query: Value) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    fn to_body(&self) -> DatagridResult<Value> {
        serde_json::to_value(self).map_err(|e| DatagridError::Backend(e.into()))
    }
}

/// Proxy query over one search index.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    index: String,
    request: SearchRequest,
    filters: Vec<Value>,
    facets: Vec<(String, Value)>,
    state: QueryState,
    results: Vec<Row>,
    facet_results: Value,
    client: Arc<dyn SearchClient>,
}

impl SearchQuery {
    /// Query every document of `index`.
    pub fn new(index: &str, client: Arc<dyn SearchClient>) -> Self {
        Self::with_request(index, SearchRequest::default(), client)
    }

    /// Start from an existing request body.
    pub fn with_request(index: &str, request: SearchRequest, client: Arc<dyn SearchClient>) -> Self {
        Self {
            index: index.to_string(),
            request,
            filters: Vec::new(),
            facets: Vec::new(),
            state: QueryState::default(),
            results: Vec::new(),
            facet_results: Value::Null,
            client,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// The wrapped request, for operations the proxy does not model.
    pub fn native_builder(&self) -> &SearchRequest {
        &self.request
    }

    pub fn native_builder_mut(&mut self) -> &mut SearchRequest {
        &mut self.request
    }

    pub(super) fn state(&self) -> &QueryState {
        &self.state
    }

    pub(super) fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    /// Add a filter clause; all filters must match.
    pub fn add_filter(&mut self, filter: Value) -> &mut Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[Value] {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: Vec<Value>) -> &mut Self {
        self.filters = filters;
        self
    }

    /// Add a named aggregation, restricted to the documents the filters keep.
    pub fn add_facet(&mut self, name: impl Into<String>, aggregation: Value) -> &mut Self {
        self.facets.push((name.into(), aggregation));
        self
    }

    pub fn facets(&self) -> &[(String, Value)] {
        &self.facets
    }

    pub fn results(&self) -> &[Row] {
        &self.results
    }

    /// Aggregation results of the last `execute`, keyed by facet name.
    pub fn facet_results(&self) -> &Value {
        &self.facet_results
    }

    /// The request as it will be sent: sort, filters, facets and window applied.
    pub fn prepare(&self) -> SearchRequest {
        let mut request = self.request.clone();

        if let Some((field, order)) = self.state.sort() {
            let direction = order.as_str().to_ascii_lowercase();
            request.sort = vec![json!({ field.path(): {"order": direction} })];
        }

        let compound = json!({"bool": {"must": self.filters}});
        if !self.filters.is_empty() {
            request.query = json!({
                "bool": {
                    "must": [request.query],
                    "filter": [compound],
                }
            });
        }

        for (name, aggregation) in &self.facets {
            request.aggs.insert(
                name.clone(),
                json!({
                    "filter": compound,
                    "aggs": { name.as_str(): aggregation },
                }),
            );
        }

        if let Some(size) = self.state.max_results.filter(|&max| max > 0) {
            request.size = Some(size);
        }
        request.from = Some(self.state.first_result.unwrap_or(0));

        request
    }

    /// Run the prepared request and cache hits and aggregations.
    pub async fn execute(&mut self) -> DatagridResult<Vec<Row>> {
        let body = self.prepare().to_body()?;
        debug!(index = %self.index, body = %body, "executing search query");

        let response = self.client.search(&self.index, &body).await?;
        self.results = response.hits.clone();
        self.facet_results = unwrap_facets(&self.facets, response.aggregations);
        Ok(response.hits)
    }

    /// Total hits, from a request that fetches no documents.
    pub async fn count(&self) -> DatagridResult<u64> {
        let mut request = self.prepare();
        request.sort.clear();
        request.aggs.clear();
        request.from = None;
        request.size = Some(0);
        request.track_total_hits = Some(true);

        let body = request.to_body()?;
        debug!(index = %self.index, body = %body, "counting search hits");

        let response = self.client.search(&self.index, &body).await?;
        Ok(response.total)
    }
}

/// Strip the filter wrapper `prepare` puts around each facet.
fn unwrap_facets(facets: &[(String, Value)], mut aggregations: Value) -> Value {
    let Some(map) = aggregations.as_object_mut() else {
        return Value::Null;
    };
    for (name, _) in facets {
        if let Some(wrapper) = map.get_mut(name)
            && let Some(inner) = wrapper.get_mut(name.as_str()).map(Value::take)
        {
            *wrapper = inner;
        }
    }
    aggregations
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::SearchResponse;
    use crate::field::{AssociationMapping, FieldDescription};
    use crate::proxy_query::SortOrder;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct EmptyClient;

    #[async_trait]
    impl SearchClient for EmptyClient {
        async fn search(&self, _index: &str, _body: &Value) -> DatagridResult<SearchResponse> {
            Ok(SearchResponse::default())
        }
    }

    fn query() -> SearchQuery {
        SearchQuery::new("articles", Arc::new(EmptyClient))
    }

    #[test]
    fn default_request_matches_all() {
        let body = serde_json::to_value(query().prepare()).unwrap();
        assert_eq!(body, json!({"query": {"match_all": {}}, "from": 0}));
    }

    #[test]
    fn filters_compose_into_bool_must() {
        let mut q = query();
        q.add_filter(json!({"term": {"status": "published"}}));
        q.add_filter(json!({"range": {"rating": {"lte": 4}}}));

        let request = q.prepare();
        assert_eq!(
            request.query,
            json!({
                "bool": {
                    "must": [{"match_all": {}}],
                    "filter": [{"bool": {"must": [
                        {"term": {"status": "published"}},
                        {"range": {"rating": {"lte": 4}}},
                    ]}}],
                }
            })
        );
        assert_eq!(q.native_builder().query, match_all());
    }

    #[test]
    fn facets_carry_the_compound_filter() {
        let mut q = query();
        q.add_filter(json!({"term": {"status": "published"}}));
        q.add_facet("tags", json!({"terms": {"field": "tags"}}));

        let request = q.prepare();
        assert_eq!(
            request.aggs["tags"],
            json!({
                "filter": {"bool": {"must": [{"term": {"status": "published"}}]}},
                "aggs": {"tags": {"terms": {"field": "tags"}}},
            })
        );
    }

    #[test]
    fn sort_and_window() {
        let mut q = query();
        q.state_mut().sort_by = Some(
            FieldDescription::new("author_name")
                .field("name")
                .through(AssociationMapping::new("author", "users", "author_id")),
        );
        q.state_mut().sort_order = Some(SortOrder::Desc);
        q.state_mut().first_result = Some(30);
        q.state_mut().max_results = Some(10);

        let request = q.prepare();
        assert_eq!(request.sort, vec![json!({"author.name": {"order": "desc"}})]);
        assert_eq!(request.from, Some(30));
        assert_eq!(request.size, Some(10));
    }

    #[test]
    fn zero_max_results_leaves_size_unset() {
        let mut q = query();
        q.state_mut().max_results = Some(0);
        assert_eq!(q.prepare().size, None);
    }

    #[test]
    fn facet_results_are_unwrapped() {
        let facets = vec![("tags".to_string(), json!({"terms": {"field": "tags"}}))];
        let aggregations = json!({
            "tags": {"doc_count": 3, "tags": {"buckets": [{"key": "rust", "doc_count": 3}]}}
        });
        assert_eq!(
            unwrap_facets(&facets, aggregations),
            json!({"tags": {"buckets": [{"key": "rust", "doc_count": 3}]}})
        );
        assert!(unwrap_facets(&facets, Value::Null).is_null());
    }
}
