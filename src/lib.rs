//! # SWAPI Query Engine
//!
//! Filterable, paginated and enriched read views over the Star Wars API.
//!
//! The upstream service pages its collections and only supports a basic
//! `search`. Queries that filter on other attributes, or sort, are answered
//! by materializing the whole collection with concurrent page fetches and
//! filtering locally; pagination metadata always describes the filtered
//! result. Reference links can be expanded into nested entities.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use swapi_query_engine::{EngineConfig, QueryEngine};
//! use swapi_query_engine::domain::ResourceKind;
//! use swapi_query_engine::query::QueryBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::load().await?;
//!     let engine = QueryEngine::new(config)?;
//!
//!     let query = QueryBuilder::new(ResourceKind::Character)
//!         .filter("gender", "female")
//!         .include("homeworld")
//!         .page(1)
//!         .build()?;
//!
//!     let result = engine.execute(&query).await?;
//!     println!("{} of {} characters", result.page_info.count, result.page_info.total);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod orchestrator;
pub mod pagination;
pub mod pipeline;
pub mod present;
pub mod query;
pub mod traits;
pub mod upstream;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub mod cli_error;

// Re-export main types
pub use cache::{BoundedCache, CacheStats, EntityCache, FetchKey, PageCache};
pub use config::{CacheConfig, EngineConfig, QueryConfig, UpstreamConfig};
pub use domain::{Entity, Page, ReferenceLink, ResourceKind};
pub use enrich::{EnrichmentSet, Enricher};
pub use error::{EngineError, Result, UpstreamError, ValidationError};
pub use filter::{FieldPredicate, FilterEngine, MatchMode, SortDirection, SortSpec};
pub use orchestrator::FetchOrchestrator;
pub use pagination::{PageInfo, QueryResult, paginate};
pub use pipeline::{PipelineResponse, RequestPipeline};
pub use query::{Query, QueryBuilder, UPSTREAM_PAGE_SIZE};
pub use traits::Upstream;
pub use upstream::{SwapiClient, UpstreamStats};

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Combined counters of the engine's upstream traffic and caches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineStats {
    pub upstream: UpstreamStats,
    pub page_cache: CacheStats,
    pub entity_cache: CacheStats,
}

/// Main entry point: answers [`Query`] values against the upstream service.
///
/// Caches are created from the configuration or injected with
/// [`QueryEngine::with_caches`], and live as long as the engine.
pub struct QueryEngine {
    config: EngineConfig,
    client: Arc<SwapiClient>,
    orchestrator: FetchOrchestrator<SwapiClient>,
    enricher: Enricher<SwapiClient>,
    filter: FilterEngine,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let ttl = config.cache.ttl();
        let page_cache = Arc::new(PageCache::new("pages", config.cache.page_capacity, ttl));
        let entity_cache = Arc::new(EntityCache::new(
            "entities",
            config.cache.entity_capacity,
            ttl,
        ));
        Self::with_caches(config, page_cache, entity_cache)
    }

    /// Builds an engine around existing caches, for sharing them between
    /// engines.
    pub fn with_caches(
        config: EngineConfig,
        page_cache: Arc<PageCache>,
        entity_cache: Arc<EntityCache>,
    ) -> Result<Self> {
        config.validate()?;

        let client = Arc::new(SwapiClient::new(
            &config.upstream,
            page_cache,
            entity_cache,
        )?);
        let orchestrator =
            FetchOrchestrator::new(Arc::clone(&client), config.query.max_concurrent_fetches);
        let enricher = Enricher::new(Arc::clone(&client), config.query.max_concurrent_fetches);

        info!(
            upstream = %client.base_url(),
            page_capacity = config.cache.page_capacity,
            max_concurrent_fetches = config.query.max_concurrent_fetches,
            "Query engine initialized"
        );

        Ok(Self {
            config,
            client,
            orchestrator,
            enricher,
            filter: FilterEngine::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<SwapiClient> {
        &self.client
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            upstream: self.client.stats(),
            page_cache: self.client.page_cache().stats().await,
            entity_cache: self.client.entity_cache().stats().await,
        }
    }

    /// Answers a query.
    ///
    /// Without local filters or sort, and at the upstream page size, only
    /// the requested upstream page is fetched. Otherwise the collection is
    /// materialized, filtered and sorted, then sliced. Enrichment runs last
    /// and only on the emitted window.
    #[tracing::instrument(
        name = "engine.execute",
        skip(self, query),
        fields(kind = %query.kind, page = query.page)
    )]
    pub async fn execute(&self, query: &Query) -> Result<QueryResult> {
        let mut result = if self.needs_materialization(query) {
            self.execute_materialized(query).await?
        } else {
            self.execute_passthrough(query).await?
        };

        result.entities = self
            .enricher
            .enrich_all(
                result.entities,
                &query.enrichment,
                self.config.query.enrichment_depth,
            )
            .await;

        debug!(
            count = result.page_info.count,
            total = result.page_info.total,
            "Query answered"
        );
        Ok(result)
    }

    /// Upstream pages can only be served as they are when the window has
    /// their size. The configured window size plays no part here.
    fn needs_materialization(&self, query: &Query) -> bool {
        query.needs_local_processing() || query.page_size != UPSTREAM_PAGE_SIZE
    }

    async fn execute_passthrough(&self, query: &Query) -> Result<QueryResult> {
        let search = query.search.as_deref();

        match self.client.fetch_page(query.kind, query.page, search).await {
            Ok(page) => Ok(QueryResult {
                page_info: PageInfo::passthrough(
                    page.count,
                    query.page,
                    query.page_size,
                    page.entities.len(),
                ),
                entities: page.entities.clone(),
            }),
            // upstream answers 404 past its last page
            Err(e) if query.page > 1 && e.upstream().is_some_and(UpstreamError::is_not_found) => {
                debug!("Page {} is past the end of {}", query.page, query.kind);
                let first = self.client.fetch_page(query.kind, 1, search).await?;
                Ok(QueryResult::empty(query.page, query.page_size, first.count))
            }
            Err(e) => Err(e),
        }
    }

    async fn execute_materialized(&self, query: &Query) -> Result<QueryResult> {
        let collection = self
            .orchestrator
            .fetch_all(query.kind, query.search.as_deref())
            .await?;
        let materialized = collection.len();

        let filtered = self
            .filter
            .apply(collection, &query.predicates, query.sort.as_ref());
        debug!(
            "Filtered {} {} down to {}",
            materialized,
            query.kind,
            filtered.len()
        );

        Ok(paginate(filtered, query.page, query.page_size))
    }
}
