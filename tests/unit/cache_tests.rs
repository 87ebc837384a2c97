//! Unit tests for page and entity cache behaviour seen through the engine

use crate::common::{create_test_config, create_test_galaxy};
use std::sync::Arc;
use swapi_query_engine::cache::{EntityCache, FetchKey, PageCache};
use swapi_query_engine::domain::ResourceKind;
use swapi_query_engine::query::QueryBuilder;
use swapi_query_engine::QueryEngine;

/// Test engines built on the same caches share fetched pages
#[tokio::test]
async fn test_shared_caches_between_engines() {
    let swapi = create_test_galaxy().await;
    let page_cache = Arc::new(PageCache::new("pages", 64, None));
    let entity_cache = Arc::new(EntityCache::new("entities", 256, None));

    let first = QueryEngine::with_caches(
        create_test_config(&swapi),
        Arc::clone(&page_cache),
        Arc::clone(&entity_cache),
    )
    .unwrap();
    let second = QueryEngine::with_caches(
        create_test_config(&swapi),
        Arc::clone(&page_cache),
        Arc::clone(&entity_cache),
    )
    .unwrap();

    let query = QueryBuilder::new(ResourceKind::Planet).page(1).build().unwrap();
    first.execute(&query).await.unwrap();
    let before = swapi.total_requests().await;

    second.execute(&query).await.unwrap();

    assert_eq!(swapi.total_requests().await, before);
    assert_eq!(second.stats().await.upstream.requests, 0);
    assert!(
        page_cache
            .contains(&FetchKey::new(ResourceKind::Planet, 1, None))
            .await
    );
}

/// Test an evicted page is fetched again
#[tokio::test]
async fn test_evicted_page_is_refetched() {
    let swapi = create_test_galaxy().await;
    let mut config = create_test_config(&swapi);
    config.cache.page_capacity = 1;
    let engine = QueryEngine::new(config).unwrap();

    let page_one = QueryBuilder::new(ResourceKind::Character).page(1).build().unwrap();
    let page_two = QueryBuilder::new(ResourceKind::Character).page(2).build().unwrap();

    engine.execute(&page_one).await.unwrap();
    engine.execute(&page_two).await.unwrap();
    engine.execute(&page_one).await.unwrap();

    assert_eq!(swapi.page_requests(ResourceKind::Character, 1).await, 2);
    assert_eq!(swapi.page_requests(ResourceKind::Character, 2).await, 1);

    let stats = engine.stats().await;
    assert_eq!(stats.page_cache.entries, 1);
    assert_eq!(stats.page_cache.capacity, 1);
}

/// Test the upstream search term is part of the cache key
#[tokio::test]
async fn test_search_pages_are_cached_separately() {
    let swapi = create_test_galaxy().await;
    let base = swapi.base_url();
    swapi
        .mount_search(
            ResourceKind::Film,
            "empire",
            &[crate::common::fixtures::film(&base, 2)],
        )
        .await;
    let engine = QueryEngine::new(create_test_config(&swapi)).unwrap();

    let all = QueryBuilder::new(ResourceKind::Film).page(1).build().unwrap();
    let empire = QueryBuilder::new(ResourceKind::Film)
        .search("empire")
        .page(1)
        .build()
        .unwrap();

    let all_films = engine.execute(&all).await.unwrap();
    let empire_films = engine.execute(&empire).await.unwrap();

    assert_eq!(all_films.page_info.total, 6);
    assert_eq!(empire_films.page_info.total, 1);
    assert_eq!(engine.stats().await.page_cache.entries, 2);
}
