//! Materialization of whole upstream collections with concurrent page fetches

use crate::domain::{Entity, Page, ResourceKind};
use crate::error::{EngineError, Result};
use crate::traits::Upstream;
use futures_util::{StreamExt, stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fetches every page of a collection and concatenates them in upstream order.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use swapi_query_engine::domain::ResourceKind;
/// use swapi_query_engine::orchestrator::FetchOrchestrator;
/// use swapi_query_engine::upstream::SwapiClient;
///
/// # async fn example(client: Arc<SwapiClient>) -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = FetchOrchestrator::new(client, 8);
/// let everyone = orchestrator.fetch_all(ResourceKind::Character, None).await?;
/// println!("{} characters", everyone.len());
/// # Ok(())
/// # }
/// ```
pub struct FetchOrchestrator<U: ?Sized> {
    upstream: Arc<U>,
    max_concurrent: usize,
}

impl<U: Upstream + ?Sized> FetchOrchestrator<U> {
    pub fn new(upstream: Arc<U>, max_concurrent: usize) -> Self {
        Self {
            upstream,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Returns the whole collection, optionally narrowed by the upstream
    /// search term.
    ///
    /// Page 1 determines the page count, unless it has no `next` link; the
    /// remaining pages are fetched concurrently. The first failing page
    /// aborts the aggregation: pending fetches are dropped and no partial
    /// collection is returned.
    #[tracing::instrument(name = "orchestrator.fetch_all", skip(self))]
    pub async fn fetch_all(&self, kind: ResourceKind, search: Option<&str>) -> Result<Vec<Entity>> {
        let start = Instant::now();

        let first = self
            .upstream
            .fetch_page(kind, 1, search)
            .await
            .map_err(|e| aggregation_failure(1, e))?;
        let page_count = if first.has_next {
            first.page_count()
        } else {
            1
        };
        info!(
            total = first.count,
            pages = page_count,
            "Materializing {} collection",
            kind
        );

        let mut pages: BTreeMap<u32, Arc<Page>> = BTreeMap::new();
        pages.insert(1, first);

        let mut pending = stream::iter(2..=page_count)
            .map(|index| async move { (index, self.upstream.fetch_page(kind, index, search).await) })
            .buffer_unordered(self.max_concurrent);

        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(page) => {
                    debug!("Page {} of {} ready", index, page_count);
                    pages.insert(index, page);
                }
                Err(e) => {
                    warn!("Aborting aggregation of {}: page {} failed: {}", kind, index, e);
                    #[cfg(feature = "metrics")]
                    metrics::increment_counter!("sqe_aggregations_failed");
                    return Err(aggregation_failure(index, e));
                }
            }
        }

        // BTreeMap iteration restores page order regardless of completion order
        let entities: Vec<Entity> = pages
            .values()
            .flat_map(|page| page.entities.iter().cloned())
            .collect();

        if entities.len() != pages[&1].count {
            warn!(
                "Upstream reported {} {} but {} were collected",
                pages[&1].count,
                kind,
                entities.len()
            );
        }

        info!(
            "Materialized {} {} in {:?}",
            entities.len(),
            kind,
            start.elapsed()
        );
        #[cfg(feature = "metrics")]
        metrics::histogram!(
            "sqe_aggregation_latency_ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(entities)
    }
}

fn aggregation_failure(page: u32, source: EngineError) -> EngineError {
    EngineError::PartialAggregation {
        page,
        source: Box::new(source),
    }
}
