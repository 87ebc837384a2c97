//! Integration tests for complete query flows against a mock upstream

use crate::common::{create_test_config, create_test_engine, create_test_galaxy, fixtures};
use swapi_query_engine::QueryEngine;
use swapi_query_engine::domain::ResourceKind;
use swapi_query_engine::error::{EngineError, UpstreamError};
use swapi_query_engine::filter::SortDirection;
use swapi_query_engine::query::QueryBuilder;

/// Filtering materializes the collection and reports the filtered total
#[tokio::test]
async fn test_female_characters_first_page() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .filter("gender", "female")
        .page(1)
        .page_size(10)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert_eq!(result.page_info.total, fixtures::FEMALE_COUNT);
    assert_ne!(result.page_info.total, fixtures::CHARACTER_COUNT as usize);
    assert_eq!(result.page_info.count, 10);
    assert_eq!(result.page_info.next, Some(2));
    assert_eq!(result.page_info.previous, None);
    assert!(
        result
            .entities
            .iter()
            .all(|c| c.str_field("gender") == Some("female"))
    );

    for page in 1..=9 {
        assert_eq!(swapi.page_requests(ResourceKind::Character, page).await, 1);
    }
    assert_eq!(engine.stats().await.upstream.page_requests, 9);
}

/// Upstream search without local filters fetches only the search page
#[tokio::test]
async fn test_film_search_is_passed_through() {
    let swapi = create_test_galaxy().await;
    let base = swapi.base_url();
    swapi
        .mount_search(ResourceKind::Film, "empire", &[fixtures::film(&base, 2)])
        .await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Film)
        .search("empire")
        .page(1)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert_eq!(result.page_info.total, 1);
    assert_eq!(result.entities[0].label(), Some("The Empire Strikes Back"));
    assert_eq!(swapi.total_requests().await, 1);
}

/// A repeated filtered query is answered from the page cache
#[tokio::test]
async fn test_repeated_query_hits_cache() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .filter("gender", "male")
        .page(1)
        .build()
        .unwrap();

    let first = engine.execute(&query).await.unwrap();
    let after_first = engine.stats().await;
    assert_eq!(after_first.upstream.requests, 9);

    let second = engine.execute(&query).await.unwrap();
    let after_second = engine.stats().await;

    assert_eq!(first, second);
    assert_eq!(second.page_info.total, fixtures::MALE_COUNT);
    assert_eq!(after_second.upstream.requests, after_first.upstream.requests);
    assert_eq!(
        after_second.page_cache.hits - after_first.page_cache.hits,
        9
    );
    assert_eq!(swapi.total_requests().await, 9);
}

/// A page failing after retries fails the query without a partial result
#[tokio::test]
async fn test_failed_page_fails_filtered_query() {
    let swapi = create_test_galaxy().await;
    swapi.fail_page(ResourceKind::Character, 4, 500).await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .filter("gender", "female")
        .page(1)
        .build()
        .unwrap();
    let err = engine.execute(&query).await.unwrap_err();

    assert!(matches!(err, EngineError::PartialAggregation { page: 4, .. }));
    assert!(matches!(
        err.upstream(),
        Some(UpstreamError::Unavailable { attempts: 3, .. })
    ));
    assert_eq!(err.status_code(), 503);
    assert_eq!(swapi.page_requests(ResourceKind::Character, 4).await, 3);
}

/// The next query after an outage retries the failed page
#[tokio::test]
async fn test_recovery_after_transient_outage() {
    let swapi = create_test_galaxy().await;
    swapi
        .fail_page_times(ResourceKind::Character, 4, 503, 3)
        .await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .filter("gender", "female")
        .page(1)
        .build()
        .unwrap();

    assert!(engine.execute(&query).await.is_err());
    let result = engine.execute(&query).await.unwrap();

    assert_eq!(result.page_info.total, fixtures::FEMALE_COUNT);
    assert_eq!(swapi.page_requests(ResourceKind::Character, 4).await, 4);
}

/// A page past the upstream's last page is empty, not an error
#[tokio::test]
async fn test_passthrough_page_beyond_last() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .page(20)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert!(result.entities.is_empty());
    assert_eq!(result.page_info.total, fixtures::CHARACTER_COUNT as usize);
    assert_eq!(result.page_info.next, None);
    assert_eq!(result.page_info.previous, Some(19));
}

/// A filtered page past the end is empty with consistent metadata
#[tokio::test]
async fn test_filtered_page_beyond_last() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .filter("gender", "female")
        .page(3)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert!(result.entities.is_empty());
    assert_eq!(result.page_info.total, fixtures::FEMALE_COUNT);
    assert_eq!(result.page_info.next, None);
    assert_eq!(result.page_info.previous, Some(2));
}

/// The last upstream page passes through with upstream metadata
#[tokio::test]
async fn test_passthrough_last_page() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .page(9)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert_eq!(result.page_info.count, 2);
    assert_eq!(result.page_info.total, 82);
    assert_eq!(result.page_info.next, None);
    assert_eq!(result.page_info.previous, Some(8));
    assert_eq!(swapi.total_requests().await, 1);
}

/// A window size other than the upstream page size is sliced locally
#[tokio::test]
async fn test_custom_page_size() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .page(2)
        .page_size(25)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert_eq!(result.page_info.count, 25);
    assert_eq!(result.page_info.total, 82);
    assert_eq!(result.page_info.next, Some(3));
    assert_eq!(result.entities[0].label(), Some("Character 26"));
    assert_eq!(result.entities[24].label(), Some("Character 50"));
}

/// A configured window smaller than an upstream page is still sliced locally
#[tokio::test]
async fn test_configured_window_smaller_than_upstream_page() {
    let swapi = create_test_galaxy().await;
    let mut config = create_test_config(&swapi);
    config.query.page_size = 5;
    let engine = QueryEngine::new(config).unwrap();

    let window = |page: u32| {
        QueryBuilder::new(ResourceKind::Character)
            .page(page)
            .page_size(5)
            .build()
            .unwrap()
    };

    let second = engine.execute(&window(2)).await.unwrap();
    assert_eq!(second.page_info.count, 5);
    assert_eq!(second.page_info.total, 82);
    assert_eq!(second.page_info.next, Some(3));
    assert_eq!(second.page_info.previous, Some(1));
    let names: Vec<&str> = second.entities.iter().filter_map(|c| c.label()).collect();
    assert_eq!(
        names,
        vec!["Character 06", "Character 07", "Character 08", "Character 09", "Character 10"]
    );

    let last = engine.execute(&window(17)).await.unwrap();
    assert_eq!(last.page_info.count, 2);
    assert_eq!(last.page_info.next, None);
    assert_eq!(last.entities[1].label(), Some("Character 82"));

    let beyond = engine.execute(&window(18)).await.unwrap();
    assert!(beyond.entities.is_empty());
    assert_eq!(beyond.page_info.next, None);
    assert_eq!(beyond.page_info.previous, Some(17));

    // every upstream page was fetched once and then served from cache
    assert_eq!(swapi.total_requests().await, 9);
}

/// Walking a sorted result via `next` visits every entity once, in order
#[tokio::test]
async fn test_walk_sorted_pages() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let mut heights = Vec::new();
    let mut page = Some(1);
    while let Some(current) = page {
        let query = QueryBuilder::new(ResourceKind::Character)
            .sort_by("height")
            .order(SortDirection::Desc)
            .page(current)
            .build()
            .unwrap();
        let result = engine.execute(&query).await.unwrap();
        assert_eq!(result.page_info.total, 82);

        heights.extend(
            result
                .entities
                .iter()
                .filter_map(|c| c.str_field("height"))
                .map(|h| h.parse::<u32>().unwrap()),
        );
        page = result.page_info.next;
    }

    let expected: Vec<u32> = (1..=fixtures::CHARACTER_COUNT).rev().map(|id| 100 + id).collect();
    assert_eq!(heights, expected);
    // later steps are served from the page cache
    assert_eq!(swapi.total_requests().await, 9);
}

/// Enrichment applies to the emitted window only
#[tokio::test]
async fn test_enrichment_of_window() {
    let swapi = create_test_galaxy().await;
    let engine = create_test_engine(&swapi);

    let query = QueryBuilder::new(ResourceKind::Character)
        .filter("gender", "female")
        .include("homeworld")
        .page(2)
        .build()
        .unwrap();
    let result = engine.execute(&query).await.unwrap();

    assert_eq!(result.entities.len(), 10);
    for character in &result.entities {
        assert!(character.get("homeworld").unwrap().is_object());
        assert!(character.get("films").unwrap().is_array());
    }

    // ten homeworld links over five distinct planets, one request each
    assert_eq!(engine.stats().await.upstream.entity_requests, 5);
    for planet in [2, 4, 6, 8, 10] {
        assert_eq!(swapi.requests_to(&format!("/api/planets/{planet}/")).await, 1);
    }
}
