use crate::domain::{Entity, Page, ReferenceLink, ResourceKind};
use crate::error::Result;
use std::sync::Arc;

// Seams between the engine stages and the upstream transport

#[async_trait::async_trait]
pub trait Upstream: Send + Sync {
    /// One page of a collection, optionally narrowed by the upstream search.
    async fn fetch_page(
        &self,
        kind: ResourceKind,
        page: u32,
        search: Option<&str>,
    ) -> Result<Arc<Page>>;

    async fn fetch_entity(&self, link: &ReferenceLink) -> Result<Entity>;
}
