//! Filters for the search engine.

use serde_json::{Value, json};

use super::{Filter, FilterState, RenderSettings, wrong_engine};
use crate::error::DatagridResult;
use crate::form::Widget;
use crate::proxy_query::{ProxyQuery, SearchQuery};
use crate::value::{FilterData, Options};

fn search<'a>(filter: &dyn Filter, query: &'a mut ProxyQuery) -> DatagridResult<&'a mut SearchQuery> {
    let engine = query.engine();
    query
        .as_search_mut()
        .ok_or_else(|| wrong_engine(filter, engine))
}

/// Exact `term` match on the document field named by option `field`.
///
/// An empty `field` falls back to the filter name.
#[derive(Debug, Default)]
pub struct TermFilter {
    state: FilterState,
}

impl TermFilter {
    fn field(&self) -> &str {
        self.option("field")
            .and_then(Value::as_str)
            .filter(|field| !field.is_empty())
            .unwrap_or_else(|| self.name())
    }
}

impl Filter for TermFilter {
    fn state(&self) -> &FilterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    fn filter_type(&self) -> &'static str {
        "term"
    }

    fn default_options(&self) -> Options {
        let mut options = Options::new();
        options.insert("field".to_string(), json!(""));
        options
    }

    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()> {
        let query = search(self, query)?;
        query.add_filter(json!({"term": { self.field(): data.value }}));
        Ok(())
    }
}

/// Upper bound (`lte`) on the document field named like the filter.
#[derive(Debug, Default)]
pub struct MaxFilter {
    state: FilterState,
}

impl Filter for MaxFilter {
    fn state(&self) -> &FilterState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FilterState {
        &mut self.state
    }

    fn filter_type(&self) -> &'static str {
        "max"
    }

    fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            widget: Widget::Choice,
            options: self.render_options(),
        }
    }

    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()> {
        let query = search(self, query)?;
        query.add_filter(json!({"range": { self.name(): {"lte": data.value} }}));
        Ok(())
    }
}
