//! Request pipeline: validate, execute and format one request
//!
//! This is the seam an HTTP layer calls. It never fails; every error is
//! turned into a status code and an error envelope.

use crate::QueryEngine;
use crate::domain::ResourceKind;
use crate::enrich::EnrichmentSet;
use crate::error::{EngineError, ValidationError};
use crate::pagination::QueryResult;
use crate::present::present_all;
use crate::query::Query;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Status code and JSON body of a handled request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub status: u16,
    pub body: Value,
}

impl PipelineResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Successful response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub count: usize,
    pub total: usize,
    pub page: u32,
    pub page_size: usize,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub data: Vec<Value>,
}

impl Envelope {
    /// Presents the window, keeping the reference lists in `requested`.
    pub fn new(result: QueryResult, requested: &EnrichmentSet) -> Self {
        let info = result.page_info;
        Self {
            success: true,
            count: info.count,
            total: info.total,
            page: info.page,
            page_size: info.page_size,
            next: info.next,
            previous: info.previous,
            data: present_all(&result.entities, requested),
        }
    }
}

/// Drives a [`QueryEngine`] from raw query-string parameters.
///
/// # Example
///
/// ```rust,no_run
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
/// use swapi_query_engine::{EngineConfig, QueryEngine};
/// use swapi_query_engine::domain::ResourceKind;
/// use swapi_query_engine::pipeline::RequestPipeline;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(QueryEngine::new(EngineConfig::default())?);
/// let pipeline = RequestPipeline::new(engine);
///
/// let params = BTreeMap::from([
///     ("page".to_string(), "1".to_string()),
///     ("gender".to_string(), "female".to_string()),
/// ]);
/// let response = pipeline.handle(ResourceKind::Character, &params).await;
/// println!("{} {}", response.status, response.body);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RequestPipeline {
    engine: Arc<QueryEngine>,
}

impl RequestPipeline {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    pub async fn handle(
        &self,
        kind: ResourceKind,
        params: &BTreeMap<String, String>,
    ) -> PipelineResponse {
        let start = Instant::now();
        info!(kind = %kind, params = ?params, "Request started");

        let query = match self.validate(kind, params) {
            Ok(query) => query,
            Err(violations) => {
                warn!(kind = %kind, fields = ?violations.fields(), "Request rejected");
                return validation_response(&violations);
            }
        };

        match self.execute(&query).await {
            Ok(result) => {
                let response = self.format(result, &query.enrichment);
                info!(
                    kind = %kind,
                    status = response.status,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Request succeeded"
                );
                response
            }
            Err(e) => {
                let response = error_response(&e);
                if e.is_client_error() {
                    warn!(kind = %kind, status = response.status, "Request failed: {}", e);
                } else {
                    error!(
                        kind = %kind,
                        status = response.status,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Request failed: {}",
                        e
                    );
                }
                response
            }
        }
    }

    fn validate(
        &self,
        kind: ResourceKind,
        params: &BTreeMap<String, String>,
    ) -> Result<Query, ValidationError> {
        let mut query = Query::from_params(kind, params)?;
        if !params.contains_key("page_size") {
            query.page_size = self.engine.config().query.page_size;
        }
        Ok(query)
    }

    async fn execute(&self, query: &Query) -> crate::Result<QueryResult> {
        self.engine.execute(query).await
    }

    fn format(&self, result: QueryResult, requested: &EnrichmentSet) -> PipelineResponse {
        match serde_json::to_value(Envelope::new(result, requested)) {
            Ok(body) => PipelineResponse { status: 200, body },
            Err(e) => error_response(&EngineError::Json(e)),
        }
    }
}

fn validation_response(violations: &ValidationError) -> PipelineResponse {
    PipelineResponse {
        status: 400,
        body: json!({
            "success": false,
            "error": "Invalid parameters",
            "details": violations.violations,
        }),
    }
}

fn error_response(error: &EngineError) -> PipelineResponse {
    if let EngineError::Validation(violations) = error {
        return validation_response(violations);
    }

    let status = error.status_code();
    let message = match status {
        404 => "Resource not found".to_string(),
        400..=499 => format!("Upstream rejected the request: {}", error.root_cause()),
        503 => "Upstream service unavailable".to_string(),
        502 => "Upstream returned an unexpected payload".to_string(),
        _ => "Internal server error".to_string(),
    };

    PipelineResponse {
        status,
        body: json!({
            "success": false,
            "error": message,
            "details": error.to_string(),
        }),
    }
}
