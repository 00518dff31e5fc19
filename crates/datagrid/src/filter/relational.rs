//! Filters for the relational engine.
//!
//! Each one targets the column named by its `field_name` option. An optional
//! `association_mappings` option walks joins first, reusing joins the query
//! already has.

use sea_query::{Alias, Expr, ExprTrait, Func, SimpleExpr};
use serde_json::{Value, json};
use tracing::warn;

use super::{Filter, FilterState, RenderSettings, wrong_engine};
use crate::error::{DatagridError, DatagridResult};
use crate::field::AssociationMapping;
use crate::form::Widget;
use crate::proxy_query::{ProxyQuery, RelationalQuery};
use crate::value::{FilterData, Options};

/// Boolean filter value meaning "yes".
pub const BOOLEAN_YES: i64 = 1;
/// Boolean filter value meaning "no".
pub const BOOLEAN_NO: i64 = 2;

fn association_mappings(filter: &dyn Filter) -> DatagridResult<Vec<AssociationMapping>> {
    match filter.option("association_mappings") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(mappings) => serde_json::from_value(mappings.clone()).map_err(|e| {
            DatagridError::configuration(format!(
                "Invalid `association_mappings` option for field `{}`: {e}",
                filter.name()
            ))
        }),
    }
}

/// Column expression the filter targets, joining associations as needed.
fn column(filter: &dyn Filter, query: &mut RelationalQuery) -> DatagridResult<SimpleExpr> {
    let field = filter.field_name()?.to_string();
    let associations = association_mappings(filter)?;
    let alias = query.entity_join(&associations);
    Ok(Expr::col((Alias::new(alias), Alias::new(field))).into())
}

fn relational<'a>(
    filter: &dyn Filter,
    query: &'a mut ProxyQuery,
) -> DatagridResult<&'a mut RelationalQuery> {
    let engine = query.engine();
    query
        .as_relational_mut()
        .ok_or_else(|| wrong_engine(filter, engine))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a bound JSON scalar into a bindable SQL value.
fn sql_value(value: &Value) -> Option<sea_query::Value> {
    match value {
        Value::String(s) => Some(s.clone().into()),
        Value::Number(n) => n
            .as_i64()
            .map(Into::into)
            .or_else(|| n.as_f64().map(Into::into)),
        Value::Bool(b) => Some((*b).into()),
        _ => None,
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ---------------------------------------------------------------------------
// string
// ---------------------------------------------------------------------------

/// Operators understood by [`StringFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOperator {
    Contains,
    NotContains,
    Equals,
    StartsWith,
    EndsWith,
}

impl StringOperator {
    fn parse(kind: Option<&str>) -> Option<Self> {
        match kind {
            None | Some("") | Some("contains") => Some(StringOperator::Contains),
            Some("not_contains") => Some(StringOperator::NotContains),
            Some("equals") | Some("=") => Some(StringOperator::Equals),
            Some("starts_with") => Some(StringOperator::StartsWith),
            Some("ends_with") => Some(StringOperator::EndsWith),
            Some(_) => None,
        }
    }
}

/// Text matching on a column. Option `case_sensitive` (default `true`).
#[derive(Debug, Default)]
pub struct StringFilter {
    state: FilterState,
}

impl Filter for StringFilter {
    fn state(&self) -> &FilterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    fn filter_type(&self) -> &'static str {
        "string"
    }

    fn default_options(&self) -> Options {
        let mut options = Options::new();
        options.insert("case_sensitive".to_string(), json!(true));
        options
    }

    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()> {
        let query = relational(self, query)?;
        let Some(value) = scalar_string(&data.value) else {
            warn!(filter = %self.name(), value = %data.value, "ignoring non-scalar string filter value");
            return Ok(());
        };
        let operator = StringOperator::parse(data.kind.as_deref()).unwrap_or_else(|| {
            warn!(filter = %self.name(), kind = ?data.kind, "unknown string operator, using contains");
            StringOperator::Contains
        });

        let case_sensitive = self
            .option("case_sensitive")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let mut field = column(self, query)?;
        let mut value = value;
        if !case_sensitive {
            field = Func::lower(field).into();
            value = value.to_lowercase();
        }

        let escaped = escape_like_wildcards(&value);
        let expr = match operator {
            StringOperator::Contains => field.like(format!("%{escaped}%")),
            StringOperator::NotContains => field.not_like(format!("%{escaped}%")),
            StringOperator::Equals => field.eq(value),
            StringOperator::StartsWith => field.like(format!("{escaped}%")),
            StringOperator::EndsWith => field.like(format!("%{escaped}")),
        };

        query.add_condition(self.condition(), expr);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// number
// ---------------------------------------------------------------------------

/// Comparison operators understood by [`NumberFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberOperator {
    Equal,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
}

impl NumberOperator {
    fn parse(kind: Option<&str>) -> Option<Self> {
        match kind {
            None | Some("") | Some("=") | Some("eq") => Some(NumberOperator::Equal),
            Some(">") | Some("gt") => Some(NumberOperator::GreaterThan),
            Some(">=") | Some("gte") => Some(NumberOperator::GreaterEqual),
            Some("<") | Some("lt") => Some(NumberOperator::LessThan),
            Some("<=") | Some("lte") => Some(NumberOperator::LessEqual),
            Some(_) => None,
        }
    }
}

fn numeric_value(value: &Value) -> Option<sea_query::Value> {
    match value {
        Value::Number(_) => sql_value(value),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Into::into)
                .or_else(|_| s.parse::<f64>().map(Into::into))
                .ok()
        }
        _ => None,
    }
}

/// Numeric comparison on a column.
#[derive(Debug, Default)]
pub struct NumberFilter {
    state: FilterState,
}

impl Filter for NumberFilter {
    fn state(&self) -> &FilterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    fn filter_type(&self) -> &'static str {
        "number"
    }

    fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            widget: Widget::Number,
            options: self.render_options(),
        }
    }

    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()> {
        let query = relational(self, query)?;
        let Some(value) = numeric_value(&data.value) else {
            warn!(filter = %self.name(), value = %data.value, "ignoring non-numeric filter value");
            return Ok(());
        };
        let Some(operator) = NumberOperator::parse(data.kind.as_deref()) else {
            return Err(DatagridError::UnexpectedType {
                expected: "=|>|>=|<|<=".to_string(),
                given: data.kind.clone().unwrap_or_default(),
            });
        };

        let field = column(self, query)?;
        let expr = match operator {
            NumberOperator::Equal => field.eq(value),
            NumberOperator::GreaterThan => field.gt(value),
            NumberOperator::GreaterEqual => field.gte(value),
            NumberOperator::LessThan => field.lt(value),
            NumberOperator::LessEqual => field.lte(value),
        };

        query.add_condition(self.condition(), expr);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// boolean
// ---------------------------------------------------------------------------

fn boolean_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(BOOLEAN_YES) => Some(true),
            Some(0) | Some(BOOLEAN_NO) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "2" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Yes/no match on a boolean column.
///
/// "No" is submitted as [`BOOLEAN_NO`] since a bound `false` leaves the
/// filter inactive.
#[derive(Debug, Default)]
pub struct BooleanFilter {
    state: FilterState,
}

impl Filter for BooleanFilter {
    fn state(&self) -> &FilterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    fn filter_type(&self) -> &'static str {
        "boolean"
    }

    fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            widget: Widget::Boolean,
            options: self.render_options(),
        }
    }

    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()> {
        let query = relational(self, query)?;
        let Some(value) = boolean_value(&data.value) else {
            warn!(filter = %self.name(), value = %data.value, "ignoring unrecognised boolean filter value");
            return Ok(());
        };

        let field = column(self, query)?;
        query.add_condition(self.condition(), field.eq(value));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// choice
// ---------------------------------------------------------------------------

/// Membership test against the submitted choices. Operators `in` (default)
/// and `not_in`.
#[derive(Debug, Default)]
pub struct ChoiceFilter {
    state: FilterState,
}

impl Filter for ChoiceFilter {
    fn state(&self) -> &FilterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    fn filter_type(&self) -> &'static str {
        "choice"
    }

    fn render_settings(&self) -> RenderSettings {
        let mut options = self.render_options();
        if let Some(choices) = self.option("choices") {
            options.insert("choices".to_string(), choices.clone());
        }
        RenderSettings {
            widget: Widget::Choice,
            options,
        }
    }

    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()> {
        let query = relational(self, query)?;
        let values: Vec<sea_query::Value> = match &data.value {
            Value::Array(items) => items.iter().filter_map(sql_value).collect(),
            scalar => sql_value(scalar).into_iter().collect(),
        };
        if values.is_empty() {
            return Ok(());
        }

        let field = column(self, query)?;
        let expr = match data.kind.as_deref() {
            Some("not_in") | Some("not in") => field.is_not_in(values),
            _ => field.is_in(values),
        };

        query.add_condition(self.condition(), expr);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::SqlExecutor;
    use crate::filter::FilterCondition;
    use crate::proxy_query::SearchQuery;
    use crate::value::Row;
    use async_trait::async_trait;
    use std::sync::Arc;

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

    fn query() -> ProxyQuery {
        RelationalQuery::new("post", Arc::new(NoopExecutor)).into()
    }

    fn sql(query: &ProxyQuery) -> String {
        query.as_relational().unwrap().to_sql()
    }

    fn init<F: Filter>(mut filter: F, name: &str, options: Value) -> F {
        filter.initialize(name, options.as_object().cloned().unwrap());
        filter
    }

    #[test]
    fn string_contains_escapes_wildcards() {
        let filter = init(StringFilter::default(), "title", json!({"field_name": "title"}));
        let mut q = query();
        filter.apply(&mut q, &FilterData::value("100%")).unwrap();

        let sql = sql(&q);
        assert!(sql.contains("\"o\".\"title\" LIKE"), "{sql}");
        assert!(
            sql.contains("100\\\\%%") || sql.contains("100\\%%"),
            "LIKE wildcards should be escaped: {sql}"
        );
    }

    #[test]
    fn string_operators() {
        let filter = init(StringFilter::default(), "title", json!({"field_name": "title"}));

        let mut q = query();
        filter.apply(&mut q, &FilterData::new("starts_with", "Ru")).unwrap();
        assert!(sql(&q).contains("LIKE 'Ru%'"));

        let mut q = query();
        filter.apply(&mut q, &FilterData::new("equals", "Rust")).unwrap();
        assert!(sql(&q).contains("\"o\".\"title\" = 'Rust'"));

        let mut q = query();
        filter.apply(&mut q, &FilterData::new("not_contains", "x")).unwrap();
        assert!(sql(&q).contains("NOT LIKE '%x%'"));
    }

    #[test]
    fn string_case_insensitive_lowers_both_sides() {
        let filter = init(
            StringFilter::default(),
            "title",
            json!({"field_name": "title", "case_sensitive": false}),
        );
        let mut q = query();
        filter.apply(&mut q, &FilterData::value("RUST")).unwrap();

        let sql = sql(&q);
        assert!(sql.contains("LOWER(\"o\".\"title\") LIKE '%rust%'"), "{sql}");
    }

    #[test]
    fn string_filter_walks_associations() {
        let filter = init(
            StringFilter::default(),
            "author.name",
            json!({
                "field_name": "name",
                "association_mappings": [
                    {"field_name": "author", "target_table": "users", "local_column": "author_id"}
                ],
            }),
        );
        let mut q = query();
        filter.apply(&mut q, &FilterData::value("Ada")).unwrap();

        let sql = sql(&q);
        assert!(sql.contains("LEFT JOIN \"users\" AS \"s_author\""), "{sql}");
        assert!(sql.contains("\"s_author\".\"name\" LIKE '%Ada%'"), "{sql}");
    }

    #[test]
    fn number_comparisons() {
        let filter = init(NumberFilter::default(), "rating", json!({"field_name": "rating"}));

        let mut q = query();
        filter.apply(&mut q, &FilterData::new(">=", "4")).unwrap();
        assert!(sql(&q).contains("\"o\".\"rating\" >= 4"));

        let mut q = query();
        filter.apply(&mut q, &FilterData::new("lt", 2.5)).unwrap();
        assert!(sql(&q).contains("\"o\".\"rating\" < 2.5"), "{}", sql(&q));

        let mut q = query();
        assert!(filter.apply(&mut q, &FilterData::new("~", 1)).is_err());
    }

    #[test]
    fn number_ignores_garbage() {
        let filter = init(NumberFilter::default(), "rating", json!({"field_name": "rating"}));
        let mut q = query();
        filter.apply(&mut q, &FilterData::value("many")).unwrap();
        assert_eq!(q.as_relational().unwrap().condition_count(), 0);
    }

    #[test]
    fn boolean_yes_and_no() {
        let filter = init(BooleanFilter::default(), "published", json!({"field_name": "published"}));

        let mut q = query();
        filter.apply(&mut q, &FilterData::value(BOOLEAN_YES)).unwrap();
        assert!(sql(&q).contains("\"o\".\"published\" = TRUE"));

        let mut q = query();
        filter.apply(&mut q, &FilterData::value(BOOLEAN_NO)).unwrap();
        assert!(sql(&q).contains("\"o\".\"published\" = FALSE"));

        assert_eq!(filter.render_settings().widget, Widget::Boolean);
    }

    #[test]
    fn choice_in_and_not_in() {
        let filter = init(ChoiceFilter::default(), "status", json!({"field_name": "status"}));

        let mut q = query();
        filter
            .apply(&mut q, &FilterData::value(json!(["draft", "published"])))
            .unwrap();
        assert!(sql(&q).contains("\"o\".\"status\" IN ('draft', 'published')"));

        let mut q = query();
        filter.apply(&mut q, &FilterData::new("not_in", "draft")).unwrap();
        assert!(sql(&q).contains("\"o\".\"status\" NOT IN ('draft')"));

        let mut q = query();
        filter.apply(&mut q, &FilterData::value(json!([]))).unwrap();
        assert_eq!(q.as_relational().unwrap().condition_count(), 0);
    }

    #[test]
    fn or_condition_is_honoured() {
        let status = init(ChoiceFilter::default(), "status", json!({"field_name": "status"}));
        let mut sticky = init(BooleanFilter::default(), "sticky", json!({"field_name": "sticky"}));
        sticky.set_condition(FilterCondition::Or);

        let mut q = query();
        status.apply(&mut q, &FilterData::value("published")).unwrap();
        sticky.apply(&mut q, &FilterData::value(1)).unwrap();

        let sql = sql(&q);
        assert!(
            sql.contains("\"o\".\"status\" IN ('published') OR \"o\".\"sticky\" = TRUE"),
            "{sql}"
        );
    }

    #[test]
    fn missing_field_name_fails() {
        let filter = init(StringFilter::default(), "title", json!({}));
        let mut q = query();
        assert!(filter.apply(&mut q, &FilterData::value("x")).is_err());
    }

    #[test]
    fn rejects_search_queries() {
        #[derive(Debug)]
        struct NoClient;

        #[async_trait]
        impl crate::backend::SearchClient for NoClient {
            async fn search(
                &self,
                _index: &str,
                _body: &Value,
            ) -> DatagridResult<crate::backend::SearchResponse> {
                Ok(Default::default())
            }
        }

        let filter = init(StringFilter::default(), "title", json!({"field_name": "title"}));
        let mut q: ProxyQuery = SearchQuery::new("articles", Arc::new(NoClient)).into();
        let err = filter.apply(&mut q, &FilterData::value("x")).unwrap_err();
        assert!(err.to_string().contains("cannot be applied to a search query"));
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }
}
