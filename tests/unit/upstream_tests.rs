//! Unit tests for the upstream client

use crate::common::{MockSwapi, create_test_config, create_test_galaxy, fixtures};
use std::sync::Arc;
use swapi_query_engine::cache::{EntityCache, PageCache};
use swapi_query_engine::domain::{ReferenceLink, ResourceKind};
use swapi_query_engine::error::{EngineError, UpstreamError};
use swapi_query_engine::upstream::SwapiClient;

fn create_client(swapi: &MockSwapi) -> SwapiClient {
    let config = create_test_config(swapi);
    SwapiClient::new(
        &config.upstream,
        Arc::new(PageCache::new("pages", 64, None)),
        Arc::new(EntityCache::new("entities", 256, None)),
    )
    .expect("Failed to build client")
}

/// Test a page fetch with the raw upstream metadata
#[tokio::test]
async fn test_fetch_page() {
    let swapi = create_test_galaxy().await;
    let client = create_client(&swapi);

    let page = client
        .fetch_page(ResourceKind::Character, 2, None)
        .await
        .unwrap();

    assert_eq!(page.index, 2);
    assert_eq!(page.count, fixtures::CHARACTER_COUNT as usize);
    assert_eq!(page.entities.len(), 10);
    assert!(page.has_next);
    assert_eq!(page.page_count(), 9);
    assert_eq!(page.entities[0].label(), Some("Character 11"));
}

/// Two 5xx responses followed by a success take three attempts
#[tokio::test]
async fn test_transient_failures_are_retried() {
    let swapi = create_test_galaxy().await;
    swapi
        .fail_page_times(ResourceKind::Character, 1, 500, 2)
        .await;
    let client = create_client(&swapi);

    let page = client
        .fetch_page(ResourceKind::Character, 1, None)
        .await
        .unwrap();

    assert_eq!(page.entities.len(), 10);
    assert_eq!(swapi.page_requests(ResourceKind::Character, 1).await, 3);

    let stats = client.stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.page_requests, 1);
}

/// Test rate limiting responses are retried like server errors
#[tokio::test]
async fn test_too_many_requests_is_retried() {
    let swapi = create_test_galaxy().await;
    swapi.fail_page_times(ResourceKind::Planet, 1, 429, 1).await;
    let client = create_client(&swapi);

    let result = client.fetch_page(ResourceKind::Planet, 1, None).await;

    assert!(result.is_ok());
    assert_eq!(swapi.page_requests(ResourceKind::Planet, 1).await, 2);
}

/// Test a 404 fails on the first attempt
#[tokio::test]
async fn test_not_found_is_not_retried() {
    let swapi = create_test_galaxy().await;
    let client = create_client(&swapi);

    let err = client
        .fetch_page(ResourceKind::Character, 20, None)
        .await
        .unwrap_err();

    match err {
        EngineError::Upstream(UpstreamError::Rejected { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected Rejected error, got: {other:?}"),
    }
    assert_eq!(swapi.page_requests(ResourceKind::Character, 20).await, 1);
    assert_eq!(client.stats().retries, 0);
}

/// Test persistent server errors exhaust the retry budget
#[tokio::test]
async fn test_exhausted_retries_report_unavailable() {
    let swapi = create_test_galaxy().await;
    swapi.fail_page(ResourceKind::Planet, 1, 503).await;
    let client = create_client(&swapi);

    let err = client
        .fetch_page(ResourceKind::Planet, 1, None)
        .await
        .unwrap_err();

    match &err {
        EngineError::Upstream(UpstreamError::Unavailable {
            attempts, reason, ..
        }) => {
            assert_eq!(*attempts, 3);
            assert!(reason.contains("503"));
        }
        other => panic!("Expected Unavailable error, got: {other:?}"),
    }
    assert_eq!(err.status_code(), 503);
    assert_eq!(swapi.page_requests(ResourceKind::Planet, 1).await, 3);
}

/// Test an unparseable body is malformed and not retried
#[tokio::test]
async fn test_invalid_json_is_malformed() {
    let swapi = create_test_galaxy().await;
    swapi
        .serve_raw_page(ResourceKind::Planet, 1, "{\"count\": 10, \"results\": [")
        .await;
    let client = create_client(&swapi);

    let err = client
        .fetch_page(ResourceKind::Planet, 1, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Upstream(UpstreamError::Malformed { .. })
    ));
    assert_eq!(err.status_code(), 502);
    assert_eq!(swapi.page_requests(ResourceKind::Planet, 1).await, 1);
}

/// Test structurally invalid pages are malformed
#[tokio::test]
async fn test_missing_results_is_malformed() {
    let swapi = create_test_galaxy().await;
    swapi
        .serve_raw_page(ResourceKind::Planet, 1, r#"{"count": 10}"#)
        .await;
    swapi
        .serve_raw_page(
            ResourceKind::Planet,
            2,
            r#"{"count": 10, "results": [{"name": "Not a planet", "url": "https://swapi.dev/api/people/1/"}]}"#,
        )
        .await;
    let client = create_client(&swapi);

    for page in [1, 2] {
        let err = client
            .fetch_page(ResourceKind::Planet, page, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::Upstream(UpstreamError::Malformed { .. })),
            "page {page}: {err:?}"
        );
    }
}

/// Test repeated fetches are served from the page cache
#[tokio::test]
async fn test_page_cache_avoids_second_request() {
    let swapi = create_test_galaxy().await;
    let client = create_client(&swapi);

    let first = client
        .fetch_page(ResourceKind::Film, 1, None)
        .await
        .unwrap();
    let second = client
        .fetch_page(ResourceKind::Film, 1, None)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(swapi.page_requests(ResourceKind::Film, 1).await, 1);

    let stats = client.page_cache().stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

/// Test search terms are normalized before fetching and caching
#[tokio::test]
async fn test_search_is_normalized() {
    let swapi = create_test_galaxy().await;
    let base = swapi.base_url();
    swapi
        .mount_search(ResourceKind::Film, "empire", &[fixtures::film(&base, 2)])
        .await;
    let client = create_client(&swapi);

    let page = client
        .fetch_page(ResourceKind::Film, 1, Some("  Empire "))
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.entities[0].label(), Some("The Empire Strikes Back"));

    client
        .fetch_page(ResourceKind::Film, 1, Some("empire"))
        .await
        .unwrap();
    assert_eq!(swapi.total_requests().await, 1);
}

/// Test page fetches prime the entity cache
#[tokio::test]
async fn test_page_entities_are_cached() {
    let swapi = create_test_galaxy().await;
    let client = create_client(&swapi);

    client
        .fetch_page(ResourceKind::Character, 1, None)
        .await
        .unwrap();
    let luke = client
        .fetch_entity(&ReferenceLink::new(ResourceKind::Character, 3))
        .await
        .unwrap();

    assert_eq!(luke.label(), Some("Character 03"));
    assert_eq!(swapi.requests_to("/api/people/3/").await, 0);
    assert_eq!(client.stats().entity_requests, 0);
}

/// Test entity fetches go upstream once
#[tokio::test]
async fn test_fetch_entity() {
    let swapi = create_test_galaxy().await;
    let client = create_client(&swapi);
    let link = ReferenceLink::new(ResourceKind::Planet, 4);

    let planet = client.fetch_entity(&link).await.unwrap();
    assert_eq!(planet.kind, ResourceKind::Planet);
    assert_eq!(planet.link(), Some(link));

    client.fetch_entity(&link).await.unwrap();
    assert_eq!(swapi.requests_to("/api/planets/4/").await, 1);
    assert_eq!(client.stats().entity_requests, 1);
}

/// Test a missing entity is a client-side rejection
#[tokio::test]
async fn test_missing_entity() {
    let swapi = create_test_galaxy().await;
    swapi.fail_entity(ResourceKind::Planet, 99, 404).await;
    let client = create_client(&swapi);

    let err = client
        .fetch_entity(&ReferenceLink::new(ResourceKind::Planet, 99))
        .await
        .unwrap_err();

    assert!(err.upstream().is_some_and(UpstreamError::is_not_found));
    assert_eq!(err.status_code(), 404);
}
