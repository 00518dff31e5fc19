//! The datagrid: binds raw request values to filters, sort and paging, and
//! exposes the resulting page.
//!
//! Binding happens once. The first call to [`Datagrid::build_pager`] (directly
//! or through [`Datagrid::results`] / [`Datagrid::form`]) registers the form
//! fields, submits the values, applies the active filters, configures sort and
//! paging and initialises the pager. Later calls are no-ops.

mod builder;
mod factory;

use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{DatagridError, DatagridResult};
use crate::facet::Facet;
use crate::field::FieldDescription;
use crate::filter::Filter;
use crate::form::{FormBinder, Widget};
use crate::pager::Pager;
use crate::proxy_query::{Engine, ProxyQuery, SortOrder};
use crate::value::{
    FilterData, Options, PAGE, PER_PAGE, RESERVED_KEYS, Row, SORT_BY, SORT_ORDER, Values,
    has_submitted_value, value_as_i64,
};

pub use builder::DatagridBuilder;
pub use factory::DatagridFactory;

/// Page size used when the values carry no `_per_page`.
pub const DEFAULT_PER_PAGE: i64 = 25;

/// A filterable, sortable, paginated list over one proxy query.
#[derive(Debug)]
pub struct Datagrid {
    query: ProxyQuery,
    pager: Pager,
    form: Box<dyn FormBinder>,
    values: Values,
    filters: IndexMap<String, Box<dyn Filter>>,
    facets: Vec<Box<dyn Facet>>,
    sort_fields: IndexMap<String, FieldDescription>,
    default_per_page: i64,
    bound: bool,
    fetched: bool,
    results: Vec<Row>,
}

impl Datagrid {
    pub fn new(query: ProxyQuery, pager: Pager, form: Box<dyn FormBinder>, values: Values) -> Self {
        Self {
            query,
            pager,
            form,
            values,
            filters: IndexMap::new(),
            facets: Vec::new(),
            sort_fields: IndexMap::new(),
            default_per_page: DEFAULT_PER_PAGE,
            bound: false,
            fetched: false,
            results: Vec::new(),
        }
    }

    /// Page size used when the values carry no `_per_page`.
    pub fn with_default_per_page(mut self, per_page: i64) -> Self {
        self.default_per_page = per_page;
        self
    }

    pub fn engine(&self) -> Engine {
        self.query.engine()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind the values and initialise the pager. Does nothing once bound.
    pub async fn build_pager(&mut self) -> DatagridResult<()> {
        if self.bound {
            return Ok(());
        }

        for filter in self.filters.values() {
            let settings = filter.render_settings();
            self.form
                .add_field(&filter.form_name(), settings.widget, settings.options);
        }
        for key in RESERVED_KEYS {
            self.form.add_field(key, Widget::Hidden, Options::new());
        }

        let data = self.form.submit(&self.submittable_values())?;

        let mut query = self.query.clone();
        for (name, filter) in self.filters.iter_mut() {
            self.values.entry(name.clone()).or_insert(Value::Null);

            let form_name = filter.form_name();
            if has_submitted_value(self.values.get(&form_name)) {
                let bound = data
                    .get(&form_name)
                    .map(FilterData::from_value)
                    .unwrap_or_default();
                filter.set_value(bound);
            }

            if filter.is_active()
                && let Some(value) = filter.value().cloned()
            {
                debug!(filter = %name, value = ?value, "applying filter");
                filter.apply(&mut query, &value)?;
            }
        }

        if let Some(raw) = self.values.get(SORT_BY).filter(|v| !v.is_null()).cloned() {
            let sort_by = self.resolve_sort_field(&raw)?;
            if sort_by.is_sortable() {
                let order = match self.values.get(SORT_ORDER) {
                    Some(Value::String(order)) => order.parse::<SortOrder>()?,
                    Some(Value::Null) | None => SortOrder::Asc,
                    Some(other) => {
                        return Err(DatagridError::unexpected_type("ASC|DESC", other));
                    }
                };
                self.values
                    .insert(SORT_ORDER.to_string(), json!(order.as_str()));
                query
                    .set_sort_by(Some(sort_by))
                    .set_sort_order(Some(order));
            } else {
                debug!(field = %sort_by.name, "sort field is not sortable; skipping sort");
            }
        }

        let per_page = self.int_value(PER_PAGE).unwrap_or(self.default_per_page);
        let page = self.int_value(PAGE).unwrap_or(1);
        self.pager.set_max_per_page(per_page);
        self.pager.set_page(page);
        self.pager.set_query(query.clone());
        self.pager.init().await?;

        self.query = query;
        self.bound = true;
        debug!(
            engine = %self.engine(),
            filters = self.filters.len(),
            page = self.pager.page(),
            per_page = self.pager.max_per_page(),
            "datagrid bound"
        );
        Ok(())
    }

    /// The values as submitted to the form: a descriptor in `_sort_by` is
    /// submitted as its name.
    fn submittable_values(&self) -> Values {
        let mut values = self.values.clone();
        if let Some(name) = values.get(SORT_BY).and_then(descriptor_name) {
            values.insert(SORT_BY.to_string(), json!(name));
        }
        values
    }

    fn int_value(&self, key: &str) -> Option<i64> {
        let raw = self.values.get(key).filter(|v| !v.is_null())?;
        let parsed = value_as_i64(raw);
        if parsed.is_none() {
            warn!(key = %key, value = %raw, "ignoring non-integer paging value");
        }
        parsed
    }

    /// Resolve a `_sort_by` value: a serialised descriptor, or the name of a
    /// registered sort field.
    fn resolve_sort_field(&self, raw: &Value) -> DatagridResult<FieldDescription> {
        match raw {
            Value::Object(_) => serde_json::from_value(raw.clone())
                .map_err(|_| DatagridError::unexpected_type("FieldDescription", raw)),
            Value::String(name) => self.lookup_sort_field(name).cloned().ok_or_else(|| {
                DatagridError::UnexpectedType {
                    expected: "FieldDescription".to_string(),
                    given: name.clone(),
                }
            }),
            other => Err(DatagridError::unexpected_type("FieldDescription", other)),
        }
    }

    fn lookup_sort_field(&self, name: &str) -> Option<&FieldDescription> {
        self.sort_fields.get(name).or_else(|| {
            self.sort_fields
                .values()
                .find(|field| field.sort_name() == name)
        })
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// The current page, fetched once and cached (even when empty).
    pub async fn results(&mut self) -> DatagridResult<&[Row]> {
        self.build_pager().await?;
        if !self.fetched {
            self.results = self.pager.results().await?;
            self.fetched = true;
        }
        Ok(&self.results)
    }

    /// The bound form; binds first if needed.
    pub async fn form(&mut self) -> DatagridResult<&dyn FormBinder> {
        self.build_pager().await?;
        Ok(self.form.as_ref())
    }

    /// The form without binding, for registering extra fields.
    pub fn form_mut(&mut self) -> &mut dyn FormBinder {
        self.form.as_mut()
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    /// The query filters and sort are applied to. The pager pages through a
    /// copy of it taken at binding.
    pub fn query(&self) -> &ProxyQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut ProxyQuery {
        &mut self.query
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Set a filter's value in the raw values, as if it had been submitted.
    ///
    /// `name` may be the filter name or its form name; dotted names are
    /// stored under the form name binding reads.
    pub fn set_value(&mut self, name: &str, operator: &str, value: Value) {
        let key = self
            .filters
            .get(name)
            .map_or_else(|| name.replace('.', "__"), |filter| filter.form_name());
        self.values
            .insert(key, json!({"type": operator, "value": value}));
    }

    // -----------------------------------------------------------------------
    // Filters
    // -----------------------------------------------------------------------

    /// Add a filter under its name, replacing any filter with the same name.
    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn remove_filter(&mut self, name: &str) -> Option<Box<dyn Filter>> {
        self.filters.shift_remove(name)
    }

    pub fn filter(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|filter| filter.as_ref())
    }

    pub fn filter_mut(&mut self, name: &str) -> Option<&mut Box<dyn Filter>> {
        self.filters.get_mut(name)
    }

    /// Filters in display order.
    pub fn filters(&self) -> impl Iterator<Item = &dyn Filter> {
        self.filters.values().map(|filter| filter.as_ref())
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    /// Put the named filters first, in the given order; the others follow in
    /// their current order. Unknown names are ignored.
    pub fn reorder_filters(&mut self, keys: &[&str]) {
        let mut reordered = IndexMap::with_capacity(self.filters.len());
        for key in keys {
            if let Some(filter) = self.filters.shift_remove(*key) {
                reordered.insert((*key).to_string(), filter);
            }
        }
        reordered.extend(self.filters.drain(..));
        self.filters = reordered;
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters.values().any(|filter| filter.is_active())
    }

    /// Whether any filter should be shown: active filters unless their
    /// `show_filter` option says otherwise, and filters with `show_filter: true`.
    pub fn has_displayable_filters(&self) -> bool {
        self.filters.values().any(|filter| match filter.option("show_filter") {
            None | Some(Value::Null) => filter.is_active(),
            Some(show) => show.as_bool() == Some(true),
        })
    }

    // -----------------------------------------------------------------------
    // Facets
    // -----------------------------------------------------------------------

    /// Attach a facet to the query. Only search queries support facets.
    pub fn add_facet(&mut self, facet: Box<dyn Facet>) -> DatagridResult<()> {
        if self.engine() != Engine::Search {
            return Err(DatagridError::configuration(format!(
                "Facet `{}` cannot be added to a {} datagrid",
                facet.name(),
                self.engine()
            )));
        }
        facet.apply(&mut self.query)?;
        self.facets.push(facet);
        Ok(())
    }

    pub fn facets(&self) -> impl Iterator<Item = &dyn Facet> {
        self.facets.iter().map(|facet| facet.as_ref())
    }

    /// Aggregation results of the fetched page, keyed by facet name.
    pub fn facet_results(&self) -> Option<&Value> {
        self.pager
            .query()
            .and_then(ProxyQuery::as_search)
            .map(|query| query.facet_results())
    }

    // -----------------------------------------------------------------------
    // Sorting and paging links
    // -----------------------------------------------------------------------

    /// Register a field `_sort_by` may name.
    pub fn add_sort_field(&mut self, field: FieldDescription) {
        self.sort_fields.insert(field.name.clone(), field);
    }

    pub fn sort_field(&self, name: &str) -> Option<&FieldDescription> {
        self.sort_fields.get(name)
    }

    /// Name of the field currently sorted on, if any.
    fn current_sort_name(&self) -> Option<String> {
        match self.values.get(SORT_BY)? {
            Value::String(name) => Some(
                self.lookup_sort_field(name)
                    .map(|field| field.name.clone())
                    .unwrap_or_else(|| name.clone()),
            ),
            other => descriptor_name(other).map(str::to_string),
        }
    }

    fn is_field_already_sorted(&self, field: &FieldDescription) -> bool {
        let Some(current) = self.current_sort_name() else {
            return false;
        };
        current == field.name
            || field
                .option("sortable")
                .and_then(Value::as_str)
                .is_some_and(|sortable| sortable == current)
    }

    /// Values for a link sorting on `field`: ascending, or the opposite of
    /// the current order when `field` is already the sort field.
    pub fn sort_parameters(&self, field: &FieldDescription) -> Values {
        let mut values = self.values.clone();

        let order = if self.is_field_already_sorted(field) {
            let current = values
                .get(SORT_ORDER)
                .and_then(Value::as_str)
                .and_then(|order| order.parse::<SortOrder>().ok());
            match current {
                Some(SortOrder::Asc) => SortOrder::Desc,
                _ => SortOrder::Asc,
            }
        } else {
            SortOrder::Asc
        };

        values.insert(SORT_ORDER.to_string(), json!(order.as_str()));
        values.insert(SORT_BY.to_string(), json!(field.sort_name()));
        values
    }

    /// Values for a link to `page`.
    pub fn pagination_parameters(&self, page: u32) -> Values {
        let mut values = self.submittable_values();
        values.insert(PAGE.to_string(), json!(page));
        values
    }
}

/// Name of a serialised field description.
fn descriptor_name(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map.get("name").and_then(Value::as_str),
        _ => None,
    }
}
