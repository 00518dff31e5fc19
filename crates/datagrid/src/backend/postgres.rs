//! PostgreSQL executor backed by a sqlx pool.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use super::SqlExecutor;
use crate::config::DatagridConfig;
use crate::error::{DatagridError, DatagridResult};
use crate::value::Row;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(config: &DatagridConfig) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not configured"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Executes datagrid SQL against a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn fetch_rows(&self, sql: &str) -> DatagridResult<Vec<Row>> {
        debug!(sql = %sql, "fetching rows");
        let rows: Vec<serde_json::Value> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({sql}) t"))
                .fetch_all(&self.pool)
                .await
                .map_err(DatagridError::from)?;
        Ok(rows)
    }

    async fn fetch_count(&self, sql: &str) -> DatagridResult<i64> {
        debug!(sql = %sql, "fetching count");
        let count: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(DatagridError::from)?;
        Ok(count)
    }
}
