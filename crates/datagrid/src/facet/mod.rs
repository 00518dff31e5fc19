//! Facets: named aggregations computed beside a search query's results.

mod factory;
mod terms;

use std::fmt;

use serde_json::Value;

use crate::error::{DatagridError, DatagridResult};
use crate::proxy_query::{Engine, ProxyQuery, SearchQuery};
use crate::value::Options;

pub use factory::{FacetConstructor, FacetFactory};
pub use terms::TermsFacet;

/// Name and options of a facet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetState {
    pub name: String,
    pub options: Options,
}

/// An aggregation over the documents a search query's filters keep.
pub trait Facet: Send + Sync + fmt::Debug {
    fn state(&self) -> &FacetState;

    fn state_mut(&mut self) -> &mut FacetState;

    fn facet_type(&self) -> &'static str;

    fn default_options(&self) -> Options {
        Options::new()
    }

    /// Attach the aggregation to the query.
    fn apply(&self, query: &mut ProxyQuery) -> DatagridResult<()>;

    fn initialize(&mut self, name: &str, options: Options) {
        let mut merged = self.default_options();
        merged.extend(options);
        let state = self.state_mut();
        state.name = name.to_string();
        state.options = merged;
    }

    fn name(&self) -> &str {
        &self.state().name
    }

    fn options(&self) -> &Options {
        &self.state().options
    }

    fn option(&self, name: &str) -> Option<&Value> {
        self.state().options.get(name)
    }

    fn set_option(&mut self, name: &str, value: Value) {
        self.state_mut().options.insert(name.to_string(), value);
    }
}

/// The search query a facet attaches to.
pub(crate) fn search_query<'a>(
    facet: &dyn Facet,
    query: &'a mut ProxyQuery,
) -> DatagridResult<&'a mut SearchQuery> {
    let engine = query.engine();
    query.as_search_mut().ok_or_else(|| {
        DatagridError::configuration(format!(
            "Facet `{}` requires the {} engine, got {engine}",
            facet.name(),
            Engine::Search
        ))
    })
}
