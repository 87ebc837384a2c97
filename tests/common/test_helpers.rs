//! Test helper functions and utilities

use crate::common::{MockSwapi, fixtures};
use std::collections::BTreeMap;
use std::sync::Arc;
use swapi_query_engine::domain::ResourceKind;
use swapi_query_engine::{EngineConfig, QueryEngine, RequestPipeline};

/// Configuration pointed at the mock upstream with fast retries.
pub fn create_test_config(swapi: &MockSwapi) -> EngineConfig {
    EngineConfig::test_config(&swapi.base_url())
}

pub fn create_test_engine(swapi: &MockSwapi) -> Arc<QueryEngine> {
    Arc::new(QueryEngine::new(create_test_config(swapi)).expect("Failed to build engine"))
}

pub fn create_test_pipeline(swapi: &MockSwapi) -> RequestPipeline {
    RequestPipeline::new(create_test_engine(swapi))
}

/// Mock upstream with 82 characters, 10 planets and 6 films mounted.
pub async fn create_test_galaxy() -> MockSwapi {
    let swapi = MockSwapi::new().await;
    let base = swapi.base_url();

    swapi
        .mount_collection(ResourceKind::Character, &fixtures::characters(&base))
        .await;
    swapi
        .mount_collection(ResourceKind::Planet, &fixtures::planets(&base))
        .await;
    swapi
        .mount_collection(ResourceKind::Film, &fixtures::films(&base))
        .await;

    swapi
}

/// Query-string parameters from `(key, value)` pairs.
pub fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
