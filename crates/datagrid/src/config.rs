//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Datagrid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagridConfig {
    /// PostgreSQL connection URL. Relational datagrids are unavailable without it.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Search engine base URL, e.g. `http://127.0.0.1:9200`.
    pub search_url: Option<String>,

    /// Page size used when the request does not carry `_per_page` (default: 25).
    pub per_page: u32,

    /// Number of page links rendered around the current page (default: 5).
    pub max_page_links: u32,

    /// Column counted with `COUNT(DISTINCT ...)` (default: "id").
    pub count_column: String,
}

impl Default for DatagridConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            search_url: None,
            per_page: 25,
            max_page_links: 5,
            count_column: "id".to_string(),
        }
    }
}

impl DatagridConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").ok();

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?,
            Err(_) => defaults.database_max_connections,
        };

        let search_url = env::var("SEARCH_URL")
            .ok()
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let per_page = match env::var("DATAGRID_PER_PAGE") {
            Ok(v) => v.parse().context("DATAGRID_PER_PAGE must be a valid u32")?,
            Err(_) => defaults.per_page,
        };

        let max_page_links = match env::var("DATAGRID_MAX_PAGE_LINKS") {
            Ok(v) => v
                .parse()
                .context("DATAGRID_MAX_PAGE_LINKS must be a valid u32")?,
            Err(_) => defaults.max_page_links,
        };

        let count_column =
            env::var("DATAGRID_COUNT_COLUMN").unwrap_or_else(|_| defaults.count_column.clone());

        Ok(Self {
            database_url,
            database_max_connections,
            search_url,
            per_page,
            max_page_links,
            count_column,
        })
    }
}
