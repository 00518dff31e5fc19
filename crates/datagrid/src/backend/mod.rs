//! Backend seams: the SQL executor and the search engine client.
//!
//! Proxy queries build native requests and hand them to one of these traits
//! for the actual round-trip.

mod postgres;
mod search;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DatagridResult;
use crate::value::Row;

pub use postgres::{PgExecutor, create_pool};
pub use search::HttpSearchClient;

/// Runs SQL generated by the relational proxy query.
#[async_trait]
pub trait SqlExecutor: Send + Sync + std::fmt::Debug {
    /// Run a SELECT and return each row as a JSON object keyed by column.
    async fn fetch_rows(&self, sql: &str) -> DatagridResult<Vec<Row>>;

    /// Run a SELECT returning a single integer (COUNT queries).
    async fn fetch_count(&self, sql: &str) -> DatagridResult<i64>;
}

/// Runs search requests built by the search proxy query.
#[async_trait]
pub trait SearchClient: Send + Sync + std::fmt::Debug {
    /// Post a request body to the index's `_search` endpoint.
    async fn search(&self, index: &str, body: &Value) -> DatagridResult<SearchResponse>;
}

/// The parts of a search response the datagrid consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// `_source` of each hit, in rank order.
    pub hits: Vec<Row>,

    /// Total matching documents.
    pub total: u64,

    /// Raw `aggregations` object (`Null` when absent).
    pub aggregations: Value,
}

impl SearchResponse {
    /// Read a response body.
    ///
    /// `hits.total` is accepted both as a number and as `{"value": n}`.
    pub fn from_body(body: &Value) -> Self {
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .map(|hits| {
                hits.iter()
                    .map(|hit| hit.get("_source").cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .unwrap_or_default();

        let total = match body.pointer("/hits/total") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
            None => 0,
        };

        Self {
            hits,
            total,
            aggregations: body.get("aggregations").cloned().unwrap_or(Value::Null),
        }
    }
}
