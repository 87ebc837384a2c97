//! HTTP client for the upstream SWAPI service
//!
//! Pages and entities are fetched with bounded retry and exponential
//! backoff, validated structurally and stored in the injected caches.

use crate::cache::{EntityCache, FetchKey, PageCache};
use crate::config::UpstreamConfig;
use crate::domain::{Entity, Page, ReferenceLink, ResourceKind};
use crate::error::{ConfigError, Result, UpstreamError};
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Counters of HTTP traffic sent upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamStats {
    /// Every HTTP attempt, retries included
    pub requests: u64,
    /// Page fetches that missed the page cache
    pub page_requests: u64,
    /// Entity fetches that missed the entity cache
    pub entity_requests: u64,
    pub retries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    page_requests: AtomicU64,
    entity_requests: AtomicU64,
    retries: AtomicU64,
}

/// Client for the upstream collections.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use swapi_query_engine::cache::{EntityCache, PageCache};
/// use swapi_query_engine::config::UpstreamConfig;
/// use swapi_query_engine::domain::ResourceKind;
/// use swapi_query_engine::upstream::SwapiClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SwapiClient::new(
///     &UpstreamConfig::default(),
///     Arc::new(PageCache::new("pages", 256, None)),
///     Arc::new(EntityCache::new("entities", 1024, None)),
/// )?;
/// let page = client.fetch_page(ResourceKind::Planet, 1, None).await?;
/// println!("{} planets in total", page.count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SwapiClient {
    client: Client,
    base_url: Url,
    retry_attempts: u32,
    base_delay: Duration,
    page_cache: Arc<PageCache>,
    entity_cache: Arc<EntityCache>,
    counters: Counters,
}

impl SwapiClient {
    pub fn new(
        config: &UpstreamConfig,
        page_cache: Arc<PageCache>,
        entity_cache: Arc<EntityCache>,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .connect_timeout(Duration::from_secs(config.timeout.min(5)))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if config.url.ends_with('/') {
            config.url.clone()
        } else {
            format!("{}/", config.url)
        };
        let base_url = Url::parse(&normalized).map_err(|_| ConfigError::InvalidUpstreamUrl {
            url: config.url.clone(),
        })?;

        Ok(Self {
            client,
            base_url,
            retry_attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            page_cache,
            entity_cache,
            counters: Counters::default(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn page_cache(&self) -> &Arc<PageCache> {
        &self.page_cache
    }

    pub fn entity_cache(&self) -> &Arc<EntityCache> {
        &self.entity_cache
    }

    pub fn stats(&self) -> UpstreamStats {
        UpstreamStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            page_requests: self.counters.page_requests.load(Ordering::Relaxed),
            entity_requests: self.counters.entity_requests.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }

    /// Fetches one page, serving it from the page cache when possible.
    ///
    /// Every entity of a freshly fetched page is also stored in the entity
    /// cache, so later enrichment of the same entities needs no request.
    #[tracing::instrument(name = "upstream.fetch_page", skip(self))]
    pub async fn fetch_page(
        &self,
        kind: ResourceKind,
        page: u32,
        search: Option<&str>,
    ) -> Result<Arc<Page>> {
        let key = FetchKey::new(kind, page, search);
        if let Some(cached) = self.page_cache.get(&key).await {
            debug!("Page cache hit");
            return Ok(cached);
        }

        self.counters.page_requests.fetch_add(1, Ordering::Relaxed);
        let url = self.page_url(kind, page, key.search.as_deref())?;
        let body = self.get_with_retries(&url).await?;
        let page = Arc::new(parse_page(kind, page, &url, body)?);

        for entity in &page.entities {
            if let Some(link) = entity.link() {
                self.entity_cache.put(link, entity.clone()).await;
            }
        }
        self.page_cache.put(key, Arc::clone(&page)).await;

        debug!(
            count = page.count,
            results = page.entities.len(),
            "Fetched upstream page"
        );
        Ok(page)
    }

    /// Fetches one entity, serving it from the entity cache when possible.
    #[tracing::instrument(name = "upstream.fetch_entity", skip(self), fields(link = %link))]
    pub async fn fetch_entity(&self, link: &ReferenceLink) -> Result<Entity> {
        if let Some(cached) = self.entity_cache.get(link).await {
            debug!("Entity cache hit");
            return Ok(cached);
        }

        self.counters.entity_requests.fetch_add(1, Ordering::Relaxed);
        let url = self.join(&link.path())?;
        let body = self.get_with_retries(&url).await?;
        let entity = parse_entity(link.kind, &url, body)?;

        self.entity_cache.put(*link, entity.clone()).await;
        Ok(entity)
    }

    fn join(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|_| {
            ConfigError::InvalidUpstreamUrl {
                url: format!("{}{}", self.base_url, path),
            }
            .into()
        })
    }

    fn page_url(&self, kind: ResourceKind, page: u32, search: Option<&str>) -> Result<Url> {
        let mut url = self.join(&format!("{}/", kind.segment()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &page.to_string());
            if let Some(term) = search {
                query.append_pair("search", term);
            }
        }
        Ok(url)
    }

    /// GET with retries on network errors, timeouts, 5xx and 429.
    ///
    /// Other 4xx responses fail on the first attempt.
    async fn get_with_retries(&self, url: &Url) -> std::result::Result<Value, UpstreamError> {
        let mut last_reason = String::new();

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Upstream attempt {} of {} for URL: {}",
                attempt, self.retry_attempts, url
            );
            self.counters.requests.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            metrics::increment_counter!("sqe_upstream_requests_total");

            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            UpstreamError::Malformed {
                                url: url.to_string(),
                                message: format!("Invalid JSON body: {e}"),
                            }
                        });
                    }

                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        last_reason = format!("HTTP {status}");
                    } else {
                        warn!("Upstream rejected {} with HTTP {}", url, status);
                        return Err(UpstreamError::Rejected {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(e) => {
                    last_reason = if e.is_timeout() {
                        "request timed out".to_string()
                    } else {
                        format!("network error: {e}")
                    };
                }
            }

            if attempt < self.retry_attempts {
                let delay = self.backoff(attempt);
                warn!(
                    "Attempt {} for {} failed ({}), retrying in {:?}",
                    attempt, url, last_reason, delay
                );
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            "Giving up on {} after {} attempts: {}",
            url, self.retry_attempts, last_reason
        );
        #[cfg(feature = "metrics")]
        metrics::increment_counter!("sqe_upstream_failures_total");
        Err(UpstreamError::Unavailable {
            url: url.to_string(),
            attempts: self.retry_attempts,
            reason: last_reason,
        })
    }

    /// `base * 2^(attempt-1)` plus jitter of at most 250ms, never more than
    /// the base delay itself.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt - 1));
        let jitter_cap = base.min(250) + 1;
        let jitter = rand::random::<u8>() as u64 % jitter_cap;
        Duration::from_millis(exponential + jitter)
    }
}

#[async_trait::async_trait]
impl crate::traits::Upstream for SwapiClient {
    async fn fetch_page(
        &self,
        kind: ResourceKind,
        page: u32,
        search: Option<&str>,
    ) -> Result<Arc<Page>> {
        self.fetch_page(kind, page, search).await
    }

    async fn fetch_entity(&self, link: &ReferenceLink) -> Result<Entity> {
        self.fetch_entity(link).await
    }
}

fn malformed(url: &Url, message: impl Into<String>) -> UpstreamError {
    UpstreamError::Malformed {
        url: url.to_string(),
        message: message.into(),
    }
}

/// Checks that an entity object carries a `url` linking to `kind`.
fn parse_entity(
    kind: ResourceKind,
    url: &Url,
    value: Value,
) -> std::result::Result<Entity, UpstreamError> {
    let Some(entity) = Entity::from_value(kind, value) else {
        return Err(malformed(url, "expected a JSON object"));
    };
    match entity.link() {
        Some(link) if link.kind == kind => Ok(entity),
        Some(link) => Err(malformed(
            url,
            format!("entity url points at {}, expected {}", link.kind, kind),
        )),
        None => Err(malformed(url, "entity is missing a valid 'url'")),
    }
}

fn parse_page(
    kind: ResourceKind,
    index: u32,
    url: &Url,
    body: Value,
) -> std::result::Result<Page, UpstreamError> {
    let Value::Object(mut payload) = body else {
        return Err(malformed(url, "expected a JSON object"));
    };

    let count = payload
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed(url, "missing integer 'count'"))? as usize;

    let has_next = matches!(payload.get("next"), Some(Value::String(_)));

    let Some(Value::Array(results)) = payload.remove("results") else {
        return Err(malformed(url, "missing array 'results'"));
    };

    let entities = results
        .into_iter()
        .map(|item| parse_entity(kind, url, item))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Page {
        kind,
        index,
        count,
        entities,
        has_next,
    })
}
