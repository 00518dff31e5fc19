//! Datagrid test utilities.
//!
//! Scripted backends that record what the datagrid sends them, and row
//! fixtures for integration tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use datagrid::backend::{SearchClient, SearchResponse, SqlExecutor};
use datagrid::{DatagridError, DatagridResult, Options, Row, Values};

/// SQL executor that records every statement and answers from queues.
///
/// Row queries pop the next queued row set (empty when none is left);
/// count queries pop the next queued count (`0` when none is left) or
/// fail when a failure was queued in its place.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
    counts: Mutex<VecDeque<Option<i64>>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer to the next count query.
    pub fn with_count(self, count: i64) -> Self {
        self.counts.lock().push_back(Some(count));
        self
    }

    /// Make the next count query fail with a backend error.
    pub fn with_count_failure(self) -> Self {
        self.counts.lock().push_back(None);
        self
    }

    /// Queue the answer to the next row query.
    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.rows.lock().push_back(rows);
        self
    }

    /// Queue a full relational page fetch: the distinct-id query answered
    /// with the rows' ids, then the row query answered with the rows.
    pub fn with_page(self, rows: Vec<Row>) -> Self {
        let ids = rows
            .iter()
            .map(|row| json!({"id": row.get("id").cloned().unwrap_or(Value::Null)}))
            .collect();
        self.with_rows(ids).with_rows(rows)
    }

    /// Every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    /// Statements that were count queries.
    pub fn count_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|sql| sql.contains("COUNT(DISTINCT"))
            .collect()
    }

    /// Statements that fetched rows or ids.
    pub fn row_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|sql| !sql.contains("COUNT(DISTINCT"))
            .collect()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn fetch_rows(&self, sql: &str) -> DatagridResult<Vec<Row>> {
        self.statements.lock().push(sql.to_string());
        Ok(self.rows.lock().pop_front().unwrap_or_default())
    }

    async fn fetch_count(&self, sql: &str) -> DatagridResult<i64> {
        self.statements.lock().push(sql.to_string());
        match self.counts.lock().pop_front() {
            Some(Some(count)) => Ok(count),
            Some(None) => Err(DatagridError::Backend(anyhow::anyhow!("count timed out"))),
            None => Ok(0),
        }
    }
}

/// SQL executor whose every call fails.
#[derive(Debug, Default)]
pub struct FailingExecutor;

#[async_trait]
impl SqlExecutor for FailingExecutor {
    async fn fetch_rows(&self, _sql: &str) -> DatagridResult<Vec<Row>> {
        Err(DatagridError::Backend(anyhow::anyhow!("connection refused")))
    }

    async fn fetch_count(&self, _sql: &str) -> DatagridResult<i64> {
        Err(DatagridError::Backend(anyhow::anyhow!("connection refused")))
    }
}

/// Search client that records request bodies and answers from a queue.
#[derive(Debug, Default)]
pub struct ScriptedSearchClient {
    requests: Mutex<Vec<(String, Value)>>,
    responses: Mutex<VecDeque<SearchResponse>>,
}

impl ScriptedSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw `_search` response body.
    pub fn with_response(self, body: Value) -> Self {
        self.responses
            .lock()
            .push_back(SearchResponse::from_body(&body));
        self
    }

    /// Queue a count response.
    pub fn with_total(self, total: u64) -> Self {
        self.with_response(json!({"hits": {"total": {"value": total}, "hits": []}}))
    }

    /// Queue a page of documents.
    pub fn with_hits(self, documents: Vec<Value>) -> Self {
        let hits: Vec<Value> = documents
            .into_iter()
            .map(|source| json!({"_source": source}))
            .collect();
        let total = hits.len();
        self.with_response(json!({"hits": {"total": total, "hits": hits}}))
    }

    /// `(index, body)` of every request, in order.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearchClient {
    async fn search(&self, index: &str, body: &Value) -> DatagridResult<SearchResponse> {
        self.requests.lock().push((index.to_string(), body.clone()));
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }
}

/// A post row.
pub fn post(id: i64, title: &str) -> Row {
    json!({"id": id, "title": title, "status": "published"})
}

/// Posts with ids `first..first + count`, titled "Post <id>".
pub fn posts(first: i64, count: i64) -> Vec<Row> {
    (first..first + count)
        .map(|id| post(id, &format!("Post {id}")))
        .collect()
}

/// Raw values from a JSON object literal. Non-objects give empty values.
pub fn values(value: Value) -> Values {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Values::new(),
    }
}

/// Options from a JSON object literal. Non-objects give empty options.
pub fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}
