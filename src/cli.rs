//! CLI interface for the query engine

use crate::cli_error::{exit_code_for_status, get_exit_code, print_error_with_suggestions};
use crate::config::EngineConfig;
use crate::domain::ResourceKind;
use crate::filter::SortDirection;
use crate::pipeline::RequestPipeline;
use crate::QueryEngine;
use clap::Parser;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// SWAPI Query Engine CLI
#[derive(Parser, Debug)]
#[command(name = "sqe")]
#[command(about = "Filterable, paginated and enriched views over the Star Wars API")]
#[command(version)]
pub struct Cli {
    /// Collection to query: films, people, planets, starships, species or vehicles
    pub kind: ResourceKind,

    #[arg(short, long, default_value_t = 1)]
    pub page: u32,

    /// Window size; anything but the upstream page size forces local paging
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Upstream search on the name or title
    #[arg(short, long)]
    pub search: Option<String>,

    /// Local filter as field=value, repeatable
    #[arg(short, long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    #[arg(long)]
    pub sort_by: Option<String>,

    #[arg(long)]
    pub order: Option<SortDirection>,

    /// Reference field to expand, repeatable
    #[arg(short, long)]
    pub include: Vec<String>,

    #[arg(long)]
    pub include_all: bool,

    /// Print cache and upstream counters to stderr afterwards
    #[arg(long)]
    pub stats: bool,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Query-string style parameters understood by the request pipeline.
    pub fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("page".to_string(), self.page.to_string());

        if let Some(size) = self.page_size {
            params.insert("page_size".to_string(), size.to_string());
        }
        if let Some(search) = &self.search {
            params.insert("search".to_string(), search.clone());
        }
        for (field, value) in &self.filters {
            params.insert(field.clone(), value.clone());
        }
        if let Some(sort_by) = &self.sort_by {
            params.insert("sort_by".to_string(), sort_by.clone());
        }
        if let Some(order) = self.order {
            params.insert("order".to_string(), order.to_string());
        }
        for field in &self.include {
            params.insert(format!("include_{field}"), "true".to_string());
        }
        if self.include_all {
            params.insert("include_all".to_string(), "true".to_string());
        }
        params
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected field=value, got '{raw}'")),
    }
}

/// Main CLI entry point; returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter = format!("swapi_query_engine={log_level},sqe={log_level}");

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose)
        .with_thread_ids(cli.verbose)
        .with_file(cli.verbose)
        .with_line_number(cli.verbose)
        .init();

    tracing::info!("Starting sqe v{}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("CLI arguments: {:?}", cli);
    }

    match execute(&cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error_with_suggestions(&e);
            get_exit_code(&e)
        }
    }
}

async fn load_config(cli: &Cli) -> crate::Result<EngineConfig> {
    match &cli.config {
        Some(path) => {
            let mut config = EngineConfig::from_file(path).await?;
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        None => EngineConfig::load().await,
    }
}

async fn execute(cli: &Cli) -> crate::Result<i32> {
    let config = load_config(cli).await?;
    let engine = Arc::new(QueryEngine::new(config)?);
    let pipeline = RequestPipeline::new(Arc::clone(&engine));

    let response = pipeline.handle(cli.kind, &cli.params()).await;

    println!("{}", serde_json::to_string_pretty(&response.body)?);

    let marker = if response.is_success() {
        "✓".green()
    } else {
        "✗".red()
    };
    eprintln!("{} {} {}", marker, response.status, cli.kind);

    if cli.stats {
        let stats = engine.stats().await;
        eprintln!(
            "{} upstream requests: {} (pages {}, entities {}, retries {})",
            "📊".blue(),
            stats.upstream.requests,
            stats.upstream.page_requests,
            stats.upstream.entity_requests,
            stats.upstream.retries
        );
        eprintln!(
            "{} page cache: {} hits / {} misses, {} of {} entries",
            "📊".blue(),
            stats.page_cache.hits,
            stats.page_cache.misses,
            stats.page_cache.entries,
            stats.page_cache.capacity
        );
    }

    Ok(exit_code_for_status(response.status))
}
