//! Relational proxy query using SeaQuery.
//!
//! Wraps a `SelectStatement` rooted at one table. Page fetches run in two
//! steps: a `SELECT DISTINCT <root>.<id>` honouring offset/limit, filters
//! and sort, then a select of the bare root table restricted to those ids.
//! Rows come back in id-page order. This keeps page sizes right when joins
//! fan out rows.

use std::sync::Arc;

use sea_query::{
    Alias, Asterisk, Expr, ExprTrait, Func, JoinType, OrderedStatement, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};
use tracing::debug;
use uuid::Uuid;

use super::{QueryState, SortOrder};
use crate::backend::SqlExecutor;
use crate::error::DatagridResult;
use crate::field::AssociationMapping;
use crate::filter::FilterCondition;
use crate::value::Row;

/// Alias the root table is selected under unless told otherwise.
pub const DEFAULT_ROOT_ALIAS: &str = "o";

/// Synthetic select alias for the sort expression in the id query.
pub const ORDER_BY_ALIAS: &str = "__order_by";

/// A join registered on the statement, keyed by `<parent alias>.<association>`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntityJoin {
    path: String,
    alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Ordering {
    alias: String,
    column: String,
    order: SortOrder,
}

/// Proxy query over a SQL table.
#[derive(Debug, Clone)]
pub struct RelationalQuery {
    statement: SelectStatement,
    table: String,
    root_alias: String,
    identifier: String,
    joins: Vec<EntityJoin>,
    conditions: Vec<(FilterCondition, SimpleExpr)>,
    orderings: Vec<Ordering>,
    state: QueryState,
    results: Vec<Row>,
    executor: Arc<dyn SqlExecutor>,
}

impl RelationalQuery {
    /// Select every column of `table`, aliased as [`DEFAULT_ROOT_ALIAS`].
    pub fn new(table: &str, executor: Arc<dyn SqlExecutor>) -> Self {
        Self::with_alias(table, DEFAULT_ROOT_ALIAS, executor)
    }

    /// Select every column of `table` under the given root alias.
    pub fn with_alias(table: &str, root_alias: &str, executor: Arc<dyn SqlExecutor>) -> Self {
        let mut statement = Query::select();
        statement
            .from_as(Alias::new(table), Alias::new(root_alias))
            .column((Alias::new(root_alias), Asterisk));

        Self {
            statement,
            table: table.to_string(),
            root_alias: root_alias.to_string(),
            identifier: "id".to_string(),
            joins: Vec::new(),
            conditions: Vec::new(),
            orderings: Vec::new(),
            state: QueryState::default(),
            results: Vec::new(),
            executor,
        }
    }

    /// Use another primary key column for the distinct-id step.
    pub fn identifier(mut self, column: impl Into<String>) -> Self {
        self.identifier = column.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier
    }

    /// The wrapped statement, for operations the proxy does not model.
    pub fn native_builder(&self) -> &SelectStatement {
        &self.statement
    }

    pub fn native_builder_mut(&mut self) -> &mut SelectStatement {
        &mut self.statement
    }

    pub(super) fn state(&self) -> &QueryState {
        &self.state
    }

    pub(super) fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    pub fn results(&self) -> &[Row] {
        &self.results
    }

    /// Add a predicate, combined with the previous ones by `condition`.
    pub fn add_condition(&mut self, condition: FilterCondition, expr: SimpleExpr) -> &mut Self {
        self.conditions.push((condition, expr));
        self
    }

    /// Number of predicates added through [`add_condition`](Self::add_condition).
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Order by a column in addition to (or, without a sort field, instead of)
    /// the datagrid sort.
    pub fn add_order_by(&mut self, alias: &str, column: &str, order: SortOrder) -> &mut Self {
        self.orderings.push(Ordering {
            alias: alias.to_string(),
            column: column.to_string(),
            order,
        });
        self
    }

    pub fn clear_order_by(&mut self) -> &mut Self {
        self.orderings.clear();
        self
    }

    /// Left join an association from `from_alias` under `alias` and remember it,
    /// so later association walks over the same path reuse it.
    pub fn join_association(
        &mut self,
        from_alias: &str,
        association: &AssociationMapping,
        alias: &str,
    ) -> &mut Self {
        let on = Expr::col((Alias::new(from_alias), Alias::new(&association.local_column)))
            .equals((Alias::new(alias), Alias::new(&association.foreign_column)));

        self.statement.join_as(
            JoinType::LeftJoin,
            Alias::new(&association.target_table),
            Alias::new(alias),
            on,
        );
        self.joins.push(EntityJoin {
            path: format!("{from_alias}.{}", association.field_name),
            alias: alias.to_string(),
        });
        self
    }

    /// Walk a chain of associations from the root, returning the alias of the
    /// last hop (the root alias for an empty chain).
    ///
    /// Hops already joined are reused; missing ones are left joined under
    /// `s_<assoc>_<assoc>...` aliases.
    pub fn entity_join(&mut self, associations: &[AssociationMapping]) -> String {
        let mut alias = self.root_alias.clone();
        let mut new_alias = String::from("s");

        for association in associations {
            let path = format!("{alias}.{}", association.field_name);
            new_alias.push('_');
            new_alias.push_str(&association.field_name);

            if let Some(existing) = self.joins.iter().find(|j| j.path == path) {
                alias = existing.alias.clone();
                continue;
            }
            if !self.joins.iter().any(|j| j.alias == new_alias) {
                let from = alias.clone();
                let to = new_alias.clone();
                self.join_association(&from, association, &to);
            }

            alias = new_alias.clone();
        }

        alias
    }

    /// Alias, column and direction of the datagrid sort, joining as needed.
    fn resolve_sort(&mut self) -> Option<Ordering> {
        let (field, order) = self.state.sort()?;
        let column = field.field_mapping.field_name.clone();
        let associations = field.parent_association_mappings.clone();
        let alias = self.entity_join(&associations);
        Some(Ordering {
            alias,
            column,
            order,
        })
    }

    /// The wrapped statement with the accumulated predicates applied.
    fn assembled(&self) -> SelectStatement {
        let mut statement = self.statement.clone();
        let mut conditions = self.conditions.iter();
        if let Some((_, first)) = conditions.next() {
            let folded = conditions.fold(first.clone(), |acc, (condition, expr)| {
                match condition {
                    FilterCondition::And => acc.and(expr.clone()),
                    FilterCondition::Or => acc.or(expr.clone()),
                }
            });
            statement.and_where(folded);
        }
        statement
    }

    /// The datagrid sort replaces the tracked orderings, as a query builder's
    /// `orderBy` would.
    fn apply_order(&self, statement: &mut SelectStatement, sort: Option<&Ordering>) {
        let orderings = match sort {
            Some(sort) => std::slice::from_ref(sort),
            None => self.orderings.as_slice(),
        };
        for ordering in orderings {
            statement.order_by(
                (Alias::new(&ordering.alias), Alias::new(&ordering.column)),
                sea_order(ordering.order),
            );
        }
    }

    fn apply_window(&self, statement: &mut SelectStatement) {
        if let Some(limit) = self.state.max_results {
            statement.limit(limit);
        }
        if let Some(offset) = self.state.first_result {
            statement.offset(offset);
        }
    }

    /// `SELECT DISTINCT` requires ORDER BY expressions in the select list, so
    /// each ordering column is selected under a synthetic alias.
    fn preserve_sql_ordering(&self, statement: &mut SelectStatement, sort: Option<&Ordering>) {
        if let Some(sort) = sort {
            statement.expr_as(
                Expr::col((Alias::new(&sort.alias), Alias::new(&sort.column))),
                Alias::new(ORDER_BY_ALIAS),
            );
            return;
        }
        for (i, ordering) in self.orderings.iter().enumerate() {
            statement.expr_as(
                Expr::col((Alias::new(&ordering.alias), Alias::new(&ordering.column))),
                Alias::new(format!("{ORDER_BY_ALIAS}_{i}")),
            );
        }
    }

    /// SQL of the page query as it stands, including sort and window.
    pub fn to_sql(&self) -> String {
        let mut query = self.clone();
        let sort = query.resolve_sort();
        let mut statement = query.assembled();
        query.apply_order(&mut statement, sort.as_ref());
        query.apply_window(&mut statement);
        statement.to_string(PostgresQueryBuilder)
    }

    /// SQL selecting the distinct root ids of the current page.
    pub fn ids_sql(&self) -> String {
        let mut query = self.clone();
        let sort = query.resolve_sort();
        query.build_ids_statement(sort.as_ref()).to_string(PostgresQueryBuilder)
    }

    fn build_ids_statement(&self, sort: Option<&Ordering>) -> SelectStatement {
        let mut statement = self.assembled();
        self.apply_order(&mut statement, sort);
        self.apply_window(&mut statement);
        statement
            .clear_selects()
            .distinct()
            .column((Alias::new(&self.root_alias), Alias::new(&self.identifier)));
        self.preserve_sql_ordering(&mut statement, sort);
        statement
    }

    /// Run the page query and cache its rows.
    pub async fn execute(&mut self) -> DatagridResult<Vec<Row>> {
        let sort = self.resolve_sort();

        let ids_sql = self
            .build_ids_statement(sort.as_ref())
            .to_string(PostgresQueryBuilder);
        let id_rows = self.executor.fetch_rows(&ids_sql).await?;
        let ids: Vec<sea_query::Value> = id_rows
            .iter()
            .filter_map(|row| row.get(&self.identifier))
            .filter_map(identifier_value)
            .collect();

        if ids.is_empty() {
            debug!(table = %self.table, "no ids on this page; skipping row query");
            self.results.clear();
            return Ok(Vec::new());
        }

        let sql = self.rows_statement(ids).to_string(PostgresQueryBuilder);
        let mut rows = self.executor.fetch_rows(&sql).await?;
        self.order_like_ids(&mut rows, &id_rows);
        self.results = rows.clone();
        Ok(rows)
    }

    /// Root rows for a page of ids. Joins and predicates stay out: the id
    /// query already applied them and a to-many join would repeat rows.
    fn rows_statement(&self, ids: Vec<sea_query::Value>) -> SelectStatement {
        let mut statement = Query::select();
        statement
            .from_as(Alias::new(&self.table), Alias::new(&self.root_alias))
            .column((Alias::new(&self.root_alias), Asterisk))
            .and_where(
                Expr::col((Alias::new(&self.root_alias), Alias::new(&self.identifier)))
                    .is_in(ids),
            );
        statement
    }

    /// Sort `rows` into the order the id query returned.
    fn order_like_ids(&self, rows: &mut [Row], id_rows: &[Row]) {
        let position = |row: &Row| {
            row.get(&self.identifier)
                .and_then(|id| {
                    id_rows
                        .iter()
                        .position(|candidate| candidate.get(&self.identifier) == Some(id))
                })
                .unwrap_or(usize::MAX)
        };
        rows.sort_by_cached_key(position);
    }

    /// SQL counting distinct values of `count_column` on the root alias.
    ///
    /// Ordering is dropped: it is irrelevant to the count and some engines
    /// reject it in aggregate queries.
    pub fn count_sql(&self, count_column: &str) -> String {
        let mut statement = self.assembled();
        statement
            .clear_order_by()
            .clear_selects()
            .expr_as(
                Func::count_distinct(Expr::col((
                    Alias::new(&self.root_alias),
                    Alias::new(count_column),
                ))),
                Alias::new("cnt"),
            );
        statement.to_string(PostgresQueryBuilder)
    }

    /// Total matching rows.
    pub async fn count(&self, count_column: &str) -> DatagridResult<u64> {
        let sql = self.count_sql(count_column);
        let count = self.executor.fetch_count(&sql).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn sea_order(order: SortOrder) -> sea_query::Order {
    match order {
        SortOrder::Asc => sea_query::Order::Asc,
        SortOrder::Desc => sea_query::Order::Desc,
    }
}

/// Convert an id read back from a JSON row into a bindable value.
fn identifier_value(value: &serde_json::Value) -> Option<sea_query::Value> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(Into::into),
        serde_json::Value::String(s) => Some(match Uuid::parse_str(s) {
            Ok(uuid) => uuid.into(),
            Err(_) => s.clone().into(),
        }),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::field::FieldDescription;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NoopExecutor;

    #[async_trait]
    impl SqlExecutor for NoopExecutor {
        async fn fetch_rows(&self, _sql: &str) -> DatagridResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn fetch_count(&self, _sql: &str) -> DatagridResult<i64> {
            Ok(0)
        }
    }

    fn query() -> RelationalQuery {
        RelationalQuery::new("post", Arc::new(NoopExecutor))
    }

    fn author() -> AssociationMapping {
        AssociationMapping::new("author", "users", "author_id")
    }

    fn company() -> AssociationMapping {
        AssociationMapping::new("company", "companies", "company_id")
    }

    #[test]
    fn selects_root_table() {
        let sql = query().to_sql();
        assert!(sql.contains("FROM \"post\" AS \"o\""), "{sql}");
        assert!(sql.contains("\"o\".*"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn entity_join_creates_left_joins() {
        let mut q = query();
        let alias = q.entity_join(&[author(), company()]);
        assert_eq!(alias, "s_author_company");

        let sql = q.to_sql();
        assert!(sql.contains("LEFT JOIN \"users\" AS \"s_author\""), "{sql}");
        assert!(
            sql.contains("LEFT JOIN \"companies\" AS \"s_author_company\""),
            "{sql}"
        );
        assert!(sql.contains("\"o\".\"author_id\" = \"s_author\".\"id\""), "{sql}");
    }

    #[test]
    fn entity_join_reuses_existing_alias() {
        let mut q = query();
        q.join_association("o", &author(), "a");

        let alias = q.entity_join(&[author()]);
        assert_eq!(alias, "a");

        let again = q.entity_join(&[author()]);
        assert_eq!(again, "a");

        let sql = q.to_sql();
        assert_eq!(sql.matches("LEFT JOIN").count(), 1, "{sql}");
    }

    #[test]
    fn repeated_entity_join_does_not_duplicate() {
        let mut q = query();
        q.entity_join(&[author()]);
        q.entity_join(&[author()]);
        assert_eq!(q.to_sql().matches("LEFT JOIN").count(), 1);
    }

    #[test]
    fn empty_chain_is_root_alias() {
        let mut q = query();
        assert_eq!(q.entity_join(&[]), "o");
    }

    #[test]
    fn sort_and_window_render() {
        let mut q = query();
        q.state_mut().sort_by = Some(FieldDescription::new("title").sortable());
        q.state_mut().sort_order = Some(SortOrder::Desc);
        q.state_mut().first_result = Some(20);
        q.state_mut().max_results = Some(10);

        let sql = q.to_sql();
        assert!(sql.contains("ORDER BY \"o\".\"title\" DESC"), "{sql}");
        assert!(sql.contains("LIMIT 10"), "{sql}");
        assert!(sql.contains("OFFSET 20"), "{sql}");
    }

    #[test]
    fn sort_through_association_joins_once() {
        let mut q = query();
        q.state_mut().sort_by = Some(
            FieldDescription::new("author_name")
                .field("name")
                .through(author())
                .sortable(),
        );
        q.state_mut().sort_order = Some(SortOrder::Asc);

        let sql = q.to_sql();
        assert!(sql.contains("ORDER BY \"s_author\".\"name\" ASC"), "{sql}");
        assert_eq!(sql.matches("LEFT JOIN").count(), 1, "{sql}");
    }

    #[test]
    fn ids_query_selects_sort_expression() {
        let mut q = query();
        q.state_mut().sort_by = Some(FieldDescription::new("title").sortable());
        q.state_mut().sort_order = Some(SortOrder::Asc);
        q.state_mut().max_results = Some(25);

        let sql = q.ids_sql();
        assert!(sql.starts_with("SELECT DISTINCT"), "{sql}");
        assert!(sql.contains("\"o\".\"id\""), "{sql}");
        assert!(sql.contains("\"o\".\"title\" AS \"__order_by\""), "{sql}");
        assert!(!sql.contains("\"o\".*"), "{sql}");
        assert!(sql.contains("LIMIT 25"), "{sql}");
    }

    #[test]
    fn ids_query_preserves_tracked_orderings() {
        let mut q = query();
        q.add_order_by("o", "created", SortOrder::Desc);

        let sql = q.ids_sql();
        assert!(sql.contains("\"o\".\"created\" AS \"__order_by_0\""), "{sql}");
        assert!(sql.contains("ORDER BY \"o\".\"created\" DESC"), "{sql}");
    }

    #[test]
    fn datagrid_sort_replaces_tracked_orderings() {
        let mut q = query();
        q.add_order_by("o", "created", SortOrder::Desc);
        q.state_mut().sort_by = Some(FieldDescription::new("title").sortable());
        q.state_mut().sort_order = Some(SortOrder::Asc);

        let sql = q.to_sql();
        assert!(sql.contains("ORDER BY \"o\".\"title\" ASC"), "{sql}");
        assert!(!sql.contains("created"), "{sql}");
    }

    #[test]
    fn count_strips_ordering() {
        let mut q = query();
        q.native_builder_mut()
            .order_by((Alias::new("o"), Alias::new("created")), sea_query::Order::Desc);
        q.add_order_by("o", "title", SortOrder::Asc);

        let sql = q.count_sql("id");
        assert!(sql.contains("COUNT(DISTINCT \"o\".\"id\")"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
    }

    #[test]
    fn conditions_fold_with_and_or() {
        let mut q = query();
        q.add_condition(
            FilterCondition::And,
            Expr::col((Alias::new("o"), Alias::new("status"))).eq(1),
        );
        q.add_condition(
            FilterCondition::Or,
            Expr::col((Alias::new("o"), Alias::new("sticky"))).eq(1),
        );

        let sql = q.to_sql();
        assert!(sql.contains("\"o\".\"status\" = 1 OR \"o\".\"sticky\" = 1"), "{sql}");
        assert_eq!(q.condition_count(), 2);
    }

    #[test]
    fn clone_does_not_alias_statement() {
        let original = query();
        let mut copy = original.clone();
        copy.entity_join(&[author()]);

        assert!(!original.to_sql().contains("JOIN"));
        assert!(copy.to_sql().contains("LEFT JOIN"));
    }

    #[test]
    fn identifier_values() {
        assert!(identifier_value(&serde_json::json!(5)).is_some());
        assert!(identifier_value(&serde_json::json!("abc")).is_some());
        assert!(
            identifier_value(&serde_json::json!("00000000-0000-0000-0000-000000000000")).is_some()
        );
        assert!(identifier_value(&serde_json::Value::Null).is_none());
    }
}
