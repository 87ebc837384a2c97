//! Reference link resolution
//!
//! Reference fields holding upstream URLs are replaced by the entities they
//! point at. Resolved entities of some kinds pull in further fields (see
//! [`ResourceKind::cascade_fields`]) up to a maximum depth. A link whose
//! target already appears on the current resolution path is left as is, and
//! so is any link that cannot be resolved.
//!
//! Every fan-out (window, list members, distinct window links) is bounded by
//! the enricher's concurrency limit.

use crate::domain::{Cardinality, Entity, ReferenceField, ReferenceLink, ResourceKind};
use crate::traits::Upstream;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::{StreamExt, stream};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Links resolved ahead of a window enrichment; `None` marks a failed link.
type Prefetched = HashMap<ReferenceLink, Option<Entity>>;

/// Which reference fields of the root entities to expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentSet {
    Fields(BTreeSet<String>),
    /// Every reference field of the kind
    All,
}

impl Default for EnrichmentSet {
    fn default() -> Self {
        EnrichmentSet::Fields(BTreeSet::new())
    }
}

impl EnrichmentSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnrichmentSet::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EnrichmentSet::Fields(fields) if fields.is_empty())
    }

    /// Whether the field `name` is selected, whatever its kind.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            EnrichmentSet::All => true,
            EnrichmentSet::Fields(names) => names.contains(name),
        }
    }

    /// Reference fields of `kind` selected by this set, in table order.
    /// Names that are not reference fields of `kind` are ignored.
    pub fn reference_fields(&self, kind: ResourceKind) -> Vec<&'static ReferenceField> {
        kind.reference_fields()
            .iter()
            .filter(|field| self.includes(field.name))
            .collect()
    }
}

/// Resolves reference links through an [`Upstream`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use swapi_query_engine::enrich::{EnrichmentSet, Enricher};
/// use swapi_query_engine::upstream::SwapiClient;
/// # use swapi_query_engine::domain::Entity;
///
/// # async fn example(client: Arc<SwapiClient>, luke: Entity) {
/// let enricher = Enricher::new(client, 8);
/// let luke = enricher
///     .enrich(luke, &EnrichmentSet::fields(["homeworld"]), 2)
///     .await;
/// assert!(luke.get("homeworld").is_some_and(|v| v.is_object()));
/// # }
/// ```
pub struct Enricher<U: ?Sized> {
    upstream: Arc<U>,
    max_concurrent: usize,
}

impl<U: Upstream + ?Sized> Enricher<U> {
    pub fn new(upstream: Arc<U>, max_concurrent: usize) -> Self {
        Self {
            upstream,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Expands the fields selected by `set` on `entity`.
    ///
    /// Directly requested fields sit at depth 1; fields pulled in by the
    /// cascade table sit one level below the entity that pulled them in.
    /// Nothing deeper than `max_depth` is resolved. Never fails.
    pub async fn enrich(&self, entity: Entity, set: &EnrichmentSet, max_depth: usize) -> Entity {
        self.enrich_with(entity, set, max_depth, &Prefetched::new())
            .await
    }

    /// Enriches every entity of a window, keeping their order.
    ///
    /// Links referenced directly by several entities of the window are
    /// fetched once, before any entity is expanded.
    pub async fn enrich_all(
        &self,
        entities: Vec<Entity>,
        set: &EnrichmentSet,
        max_depth: usize,
    ) -> Vec<Entity> {
        if set.is_empty() || max_depth == 0 {
            return entities;
        }

        let prefetched = self.prefetch(&entities, set).await;
        let prefetched = &prefetched;
        stream::iter(entities)
            .map(|entity| self.enrich_with(entity, set, max_depth, prefetched))
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    async fn enrich_with(
        &self,
        entity: Entity,
        set: &EnrichmentSet,
        max_depth: usize,
        prefetched: &Prefetched,
    ) -> Entity {
        let fields = set.reference_fields(entity.kind);
        if fields.is_empty() || max_depth == 0 {
            return entity;
        }

        let mut path = BTreeSet::new();
        if let Some(link) = entity.link() {
            path.insert(link);
        }
        self.expand(entity, fields, 1, max_depth, path, prefetched)
            .await
    }

    /// Fetches the distinct links the window's selected fields point at.
    async fn prefetch(&self, entities: &[Entity], set: &EnrichmentSet) -> Prefetched {
        let mut links = BTreeSet::new();
        for entity in entities {
            let own = entity.link();
            for field in set.reference_fields(entity.kind) {
                let urls: Vec<&str> = match entity.get(field.name) {
                    Some(Value::String(url)) => vec![url.as_str()],
                    Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                };
                links.extend(
                    urls.into_iter()
                        .filter_map(ReferenceLink::parse)
                        .filter(|link| Some(*link) != own),
                );
            }
        }
        debug!("Prefetching {} distinct links for the window", links.len());

        stream::iter(links)
            .map(|link| async move {
                let fetched = match self.upstream.fetch_entity(&link).await {
                    Ok(entity) => Some(entity),
                    Err(e) => {
                        degraded(&link, &e);
                        None
                    }
                };
                (link, fetched)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }

    fn expand<'a>(
        &'a self,
        mut entity: Entity,
        fields: Vec<&'static ReferenceField>,
        level: usize,
        max_depth: usize,
        path: BTreeSet<ReferenceLink>,
        prefetched: &'a Prefetched,
    ) -> BoxFuture<'a, Entity> {
        async move {
            let path = &path;
            for field in fields {
                let Some(value) = entity.fields.remove(field.name) else {
                    continue;
                };

                let expanded = match (field.cardinality, value) {
                    (_, Value::String(url)) => {
                        self.resolve(url, level, max_depth, path, prefetched)
                            .await
                    }
                    (Cardinality::List, Value::Array(items)) => {
                        let resolved: Vec<Value> = stream::iter(items)
                            .map(|item| async move {
                                match item {
                                    Value::String(url) => {
                                        self.resolve(url, level, max_depth, path, prefetched)
                                            .await
                                    }
                                    // already expanded
                                    other => other,
                                }
                            })
                            .buffered(self.max_concurrent)
                            .collect()
                            .await;
                        Value::Array(resolved)
                    }
                    (_, other) => other,
                };

                entity.fields.insert(field.name.to_string(), expanded);
            }
            entity
        }
        .boxed()
    }

    /// Resolves one URL at `level`, returning the entity as JSON or the URL
    /// unchanged when it cannot or must not be resolved.
    async fn resolve(
        &self,
        url: String,
        level: usize,
        max_depth: usize,
        path: &BTreeSet<ReferenceLink>,
        prefetched: &Prefetched,
    ) -> Value {
        let Some(link) = ReferenceLink::parse(&url) else {
            warn!("Leaving unparseable reference link as is: {}", url);
            return Value::String(url);
        };

        if path.contains(&link) {
            debug!("Not expanding {} again on the same path", link);
            return Value::String(url);
        }

        let child = match prefetched.get(&link) {
            Some(Some(child)) => child.clone(),
            // already reported when prefetching
            Some(None) => return Value::String(url),
            None => match self.upstream.fetch_entity(&link).await {
                Ok(child) => child,
                Err(e) => {
                    degraded(&link, &e);
                    return Value::String(url);
                }
            },
        };

        let cascade: Vec<&'static ReferenceField> = child
            .kind
            .cascade_fields()
            .iter()
            .filter_map(|name| child.kind.reference_field(name))
            .collect();

        if cascade.is_empty() || level + 1 > max_depth {
            return child.into_value();
        }

        let mut child_path = path.clone();
        child_path.insert(link);
        self.expand(child, cascade, level + 1, max_depth, child_path, prefetched)
            .await
            .into_value()
    }
}

fn degraded(link: &ReferenceLink, error: &crate::error::EngineError) {
    warn!("Enrichment degraded, keeping link {}: {}", link, error);
    #[cfg(feature = "metrics")]
    metrics::increment_counter!("sqe_enrichment_degraded");
}
