//! Creates datagrids for either engine from shared backends and settings.

use std::sync::Arc;

use tracing::debug;

use super::{Datagrid, DatagridBuilder};
use crate::backend::{SearchClient, SqlExecutor};
use crate::config::DatagridConfig;
use crate::error::{DatagridError, DatagridResult};
use crate::facet::FacetFactory;
use crate::filter::FilterFactory;
use crate::form::FilterForm;
use crate::pager::Pager;
use crate::proxy_query::{Engine, ProxyQuery, RelationalQuery, SearchQuery};
use crate::value::Values;

/// Holds the backends and factories every datagrid is built from.
#[derive(Debug, Clone)]
pub struct DatagridFactory {
    config: DatagridConfig,
    executor: Option<Arc<dyn SqlExecutor>>,
    search_client: Option<Arc<dyn SearchClient>>,
    filter_factory: FilterFactory,
    facet_factory: FacetFactory,
}

impl DatagridFactory {
    /// A factory with no backends and the built-in filters and facets.
    pub fn new(config: DatagridConfig) -> Self {
        Self {
            config,
            executor: None,
            search_client: None,
            filter_factory: FilterFactory::new(),
            facet_factory: FacetFactory::new(),
        }
    }

    /// Enable the relational engine.
    pub fn with_executor(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Enable the search engine.
    pub fn with_search_client(mut self, client: Arc<dyn SearchClient>) -> Self {
        self.search_client = Some(client);
        self
    }

    pub fn with_filter_factory(mut self, filter_factory: FilterFactory) -> Self {
        self.filter_factory = filter_factory;
        self
    }

    pub fn with_facet_factory(mut self, facet_factory: FacetFactory) -> Self {
        self.facet_factory = facet_factory;
        self
    }

    pub fn config(&self) -> &DatagridConfig {
        &self.config
    }

    /// An empty query over `target` (a table, or a search index).
    pub fn query(&self, engine: Engine, target: &str) -> DatagridResult<ProxyQuery> {
        let query = match engine {
            Engine::Relational => {
                let executor = self.executor.clone().ok_or_else(|| {
                    DatagridError::configuration("The relational engine has no SQL executor configured")
                })?;
                RelationalQuery::new(target, executor).into()
            }
            Engine::Search => {
                let client = self.search_client.clone().ok_or_else(|| {
                    DatagridError::configuration("The search engine has no search client configured")
                })?;
                SearchQuery::new(target, client).into()
            }
        };
        Ok(query)
    }

    /// A pager with the configured page size, link count and count column.
    pub fn pager(&self) -> Pager {
        let mut pager = Pager::new(i64::from(self.config.per_page));
        pager.set_max_page_links(self.config.max_page_links);
        pager.set_count_column(self.config.count_column.clone());
        pager
    }

    /// A datagrid over `target` bound to `values`.
    pub fn datagrid(&self, engine: Engine, target: &str, values: Values) -> DatagridResult<Datagrid> {
        debug!(engine = %engine, target = %target, "creating datagrid");
        let query = self.query(engine, target)?;
        Ok(
            Datagrid::new(query, self.pager(), Box::new(FilterForm::new()), values)
                .with_default_per_page(i64::from(self.config.per_page)),
        )
    }

    /// A builder around a new datagrid, with filters created for `engine`.
    pub fn builder(&self, engine: Engine, target: &str, values: Values) -> DatagridResult<DatagridBuilder> {
        let datagrid = self.datagrid(engine, target, values)?;
        Ok(DatagridBuilder::new(
            datagrid,
            self.filter_factory.clone().with_engine(engine),
            self.facet_factory.clone(),
        ))
    }
}
