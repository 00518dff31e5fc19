//! Backend-agnostic query handles.
//!
//! A [`ProxyQuery`] wraps a native query builder and accumulates the sort,
//! offset and limit a datagrid asks for. Translating that state into a
//! native request happens only when the query is executed, so re-running
//! always reflects the current state.

mod relational;
mod search;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DatagridError, DatagridResult};
use crate::field::FieldDescription;
use crate::value::Row;

pub use relational::{DEFAULT_ROOT_ALIAS, ORDER_BY_ALIAS, RelationalQuery};
pub use search::{SearchQuery, SearchRequest};

/// Backend selector used to key filter, pager and query construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// SQL database via sea-query.
    Relational,
    /// Search engine via its HTTP API.
    Search,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Relational => "relational",
            Engine::Search => "search",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = DatagridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relational" | "sql" => Ok(Engine::Relational),
            "search" | "elasticsearch" => Ok(Engine::Search),
            other => Err(DatagridError::configuration(format!(
                "Unsupported datagrid engine '{other}'; supported engines are: 'relational', 'search'"
            ))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// The opposite direction.
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = DatagridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(DatagridError::UnexpectedType {
                expected: "ASC|DESC".to_string(),
                given: s.to_string(),
            })
        }
    }
}

/// Sort, offset and limit shared by both backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub sort_by: Option<FieldDescription>,
    pub sort_order: Option<SortOrder>,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
}

impl QueryState {
    /// The sort to apply, when both a field and a direction are set.
    pub fn sort(&self) -> Option<(&FieldDescription, SortOrder)> {
        Some((self.sort_by.as_ref()?, self.sort_order?))
    }
}

/// A query handle over one of the supported backends.
///
/// Cloning deep-copies the native builder; the executor/client handle is
/// shared.
#[derive(Debug, Clone)]
pub enum ProxyQuery {
    Relational(RelationalQuery),
    Search(SearchQuery),
}

impl ProxyQuery {
    pub fn engine(&self) -> Engine {
        match self {
            ProxyQuery::Relational(_) => Engine::Relational,
            ProxyQuery::Search(_) => Engine::Search,
        }
    }

    fn state(&self) -> &QueryState {
        match self {
            ProxyQuery::Relational(q) => q.state(),
            ProxyQuery::Search(q) => q.state(),
        }
    }

    fn state_mut(&mut self) -> &mut QueryState {
        match self {
            ProxyQuery::Relational(q) => q.state_mut(),
            ProxyQuery::Search(q) => q.state_mut(),
        }
    }

    pub fn set_sort_by(&mut self, sort_by: Option<FieldDescription>) -> &mut Self {
        self.state_mut().sort_by = sort_by;
        self
    }

    pub fn sort_by(&self) -> Option<&FieldDescription> {
        self.state().sort_by.as_ref()
    }

    pub fn set_sort_order(&mut self, sort_order: Option<SortOrder>) -> &mut Self {
        self.state_mut().sort_order = sort_order;
        self
    }

    pub fn sort_order(&self) -> Option<SortOrder> {
        self.state().sort_order
    }

    pub fn set_first_result(&mut self, first_result: Option<u64>) -> &mut Self {
        self.state_mut().first_result = first_result;
        self
    }

    pub fn first_result(&self) -> Option<u64> {
        self.state().first_result
    }

    pub fn set_max_results(&mut self, max_results: Option<u64>) -> &mut Self {
        self.state_mut().max_results = max_results;
        self
    }

    pub fn max_results(&self) -> Option<u64> {
        self.state().max_results
    }

    /// Run the query with the current sort/offset/limit and cache the rows.
    pub async fn execute(&mut self) -> DatagridResult<Vec<Row>> {
        match self {
            ProxyQuery::Relational(q) => q.execute().await,
            ProxyQuery::Search(q) => q.execute().await,
        }
    }

    /// Total matching rows, ignoring offset/limit.
    pub async fn count(&self, count_column: &str) -> DatagridResult<u64> {
        match self {
            ProxyQuery::Relational(q) => q.count(count_column).await,
            ProxyQuery::Search(q) => q.count().await,
        }
    }

    /// Rows cached by the last `execute`.
    pub fn results(&self) -> &[Row] {
        match self {
            ProxyQuery::Relational(q) => q.results(),
            ProxyQuery::Search(q) => q.results(),
        }
    }

    pub fn as_relational(&self) -> Option<&RelationalQuery> {
        match self {
            ProxyQuery::Relational(q) => Some(q),
            ProxyQuery::Search(_) => None,
        }
    }

    pub fn as_relational_mut(&mut self) -> Option<&mut RelationalQuery> {
        match self {
            ProxyQuery::Relational(q) => Some(q),
            ProxyQuery::Search(_) => None,
        }
    }

    pub fn as_search(&self) -> Option<&SearchQuery> {
        match self {
            ProxyQuery::Search(q) => Some(q),
            ProxyQuery::Relational(_) => None,
        }
    }

    pub fn as_search_mut(&mut self) -> Option<&mut SearchQuery> {
        match self {
            ProxyQuery::Search(q) => Some(q),
            ProxyQuery::Relational(_) => None,
        }
    }
}

impl From<RelationalQuery> for ProxyQuery {
    fn from(query: RelationalQuery) -> Self {
        ProxyQuery::Relational(query)
    }
}

impl From<SearchQuery> for ProxyQuery {
    fn from(query: SearchQuery) -> Self {
        ProxyQuery::Search(query)
    }
}
