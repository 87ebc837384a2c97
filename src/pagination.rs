//! Page windows and metadata consistent with the true collection size

use crate::domain::Entity;
use serde::{Deserialize, Serialize};

/// Pagination metadata of a query result.
///
/// `next` and `previous` are page indices, `None` exactly when there is no
/// further or prior page.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::pagination::PageInfo;
///
/// let info = PageInfo::passthrough(82, 9, 10, 2);
/// assert_eq!(info.previous, Some(8));
/// assert_eq!(info.next, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub page_size: usize,
    /// Number of entities in this window
    pub count: usize,
    /// Size of the whole (filtered) collection
    pub total: usize,
    pub next: Option<u32>,
    pub previous: Option<u32>,
}

impl PageInfo {
    fn compute(total: usize, page: u32, page_size: usize, count: usize) -> Self {
        let page = page.max(1);
        let consumed = (page as usize).saturating_mul(page_size);
        Self {
            page,
            page_size,
            count,
            total,
            next: (consumed < total).then_some(page + 1),
            previous: (page > 1).then_some(page - 1),
        }
    }

    /// Metadata for a window taken straight from one upstream page.
    pub fn passthrough(total: usize, page: u32, page_size: usize, count: usize) -> Self {
        Self::compute(total, page, page_size, count)
    }
}

/// Entities of one window together with their pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub entities: Vec<Entity>,
    #[serde(flatten)]
    pub page_info: PageInfo,
}

impl QueryResult {
    pub fn empty(page: u32, page_size: usize, total: usize) -> Self {
        Self {
            entities: Vec::new(),
            page_info: PageInfo::compute(total, page, page_size, 0),
        }
    }
}

/// Slices the window `page` out of a fully materialized collection.
///
/// Pages are 1-indexed. A page past the end yields an empty window whose
/// `total` and `previous` still describe the collection.
pub fn paginate(entities: Vec<Entity>, page: u32, page_size: usize) -> QueryResult {
    let total = entities.len();
    let page = page.max(1);
    let start = ((page - 1) as usize).saturating_mul(page_size);

    let window: Vec<Entity> = entities.into_iter().skip(start).take(page_size).collect();

    QueryResult {
        page_info: PageInfo::compute(total, page, page_size, window.len()),
        entities: window,
    }
}
