//! Run a datagrid query from the command line.
//!
//! Usage:
//!   datagrid post --filters '[{"name":"title","type":"string","options":{"field_name":"title"}}]' \
//!     --values '{"title":{"type":"contains","value":"rust"},"_page":2}' --sortable title

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use datagrid::backend::{HttpSearchClient, PgExecutor, create_pool};
use datagrid::{DatagridConfig, DatagridFactory, Engine, FieldDescription, Options, Values};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Table (relational engine) or index (search engine) to list.
    target: String,

    /// Backend engine: "relational" or "search".
    #[arg(long, default_value = "relational")]
    engine: String,

    /// Filters as a JSON array of {"name", "type", "options"}.
    #[arg(long)]
    filters: Option<String>,

    /// Facets as a JSON array of {"name", "type", "options"} (search engine only).
    #[arg(long)]
    facets: Option<String>,

    /// Raw request values as a JSON object.
    #[arg(long, default_value = "{}")]
    values: String,

    /// Fields `_sort_by` may name.
    #[arg(long = "sortable")]
    sortable: Vec<String>,
}

/// A filter or facet declared on the command line.
#[derive(Debug, Deserialize)]
struct Declaration {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: Options,
}

fn parse_declarations(raw: Option<&str>, what: &str) -> Result<Vec<Declaration>> {
    match raw {
        Some(raw) => serde_json::from_str(raw).with_context(|| format!("invalid --{what} JSON")),
        None => Ok(Vec::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = DatagridConfig::from_env().context("failed to load configuration")?;
    let engine: Engine = args.engine.parse()?;

    let mut factory = DatagridFactory::new(config.clone());
    if config.database_url.is_some() {
        let pool = create_pool(&config)
            .await
            .context("failed to create database pool")?;
        factory = factory.with_executor(Arc::new(PgExecutor::new(pool)));
    }
    if let Some(url) = &config.search_url {
        factory = factory.with_search_client(Arc::new(HttpSearchClient::new(url.clone())));
    }

    let values: Values = serde_json::from_str(&args.values).context("invalid --values JSON")?;
    let filters = parse_declarations(args.filters.as_deref(), "filters")?;
    let facets = parse_declarations(args.facets.as_deref(), "facets")?;

    let mut builder = factory.builder(engine, &args.target, values)?;
    for filter in filters {
        builder.add_filter(&filter.name, &filter.kind, filter.options)?;
    }
    for facet in facets {
        builder.add_facet(&facet.name, &facet.kind, facet.options)?;
    }

    let mut datagrid = builder.into_datagrid();
    for name in &args.sortable {
        datagrid.add_sort_field(FieldDescription::new(name.as_str()).sortable());
    }

    let results = datagrid.results().await?.to_vec();
    let pager = datagrid.pager();
    info!(
        target = %args.target,
        nb_results = pager.nb_results(),
        page = pager.page(),
        "datagrid fetched"
    );

    let output = json!({
        "page": pager.page(),
        "last_page": pager.last_page(),
        "nb_results": pager.nb_results(),
        "links": pager.links(None),
        "results": results,
        "facets": datagrid.facet_results(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// Initialize the tracing subscriber.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
