//! Error types for the SWAPI query engine

use thiserror::Error;

/// Main result type used throughout the query engine.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::error::Result;
///
/// fn example_operation() -> Result<String> {
///     Ok("Success".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the query engine.
///
/// Upstream failures, aggregation failures, query validation problems and
/// configuration problems all funnel into this enum. The HTTP-facing layer
/// uses [`EngineError::status_code`] to decide between client and server
/// error responses.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::error::{EngineError, UpstreamError};
///
/// let err: EngineError = UpstreamError::Rejected {
///     url: "https://swapi.dev/api/people/999/".to_string(),
///     status: 404,
/// }
/// .into();
/// assert_eq!(err.status_code(), 404);
/// ```
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Aggregation failed at page {page}: {source}")]
    PartialAggregation {
        page: u32,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl EngineError {
    /// Unwraps aggregation wrappers down to the error that triggered them.
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::PartialAggregation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the upstream error behind this error, if there is one.
    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self.root_cause() {
            EngineError::Upstream(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP-like status code for the response layer.
    ///
    /// Validation problems and upstream rejections are client errors; every
    /// other failure is a server error. An aggregation failure is never
    /// reported as a client error even when a page was rejected, because
    /// the client asked for a valid collection.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(_) => 400,
            EngineError::Upstream(UpstreamError::Rejected { status, .. }) => {
                if *status == 404 { 404 } else { 400 }
            }
            EngineError::Upstream(UpstreamError::Unavailable { .. }) => 503,
            EngineError::Upstream(UpstreamError::Malformed { .. }) => 502,
            EngineError::PartialAggregation { source, .. } => source.status_code().max(500),
            _ => 500,
        }
    }

    /// Whether the failure is attributable to the caller.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Errors raised while talking to the upstream service.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::error::UpstreamError;
///
/// let error = UpstreamError::Unavailable {
///     url: "https://swapi.dev/api/films/".to_string(),
///     attempts: 3,
///     reason: "HTTP 503".to_string(),
/// };
/// assert!(error.to_string().contains("after 3 attempts"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Upstream unavailable after {attempts} attempts: {url} ({reason})")]
    Unavailable {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Upstream rejected request with HTTP {status}: {url}")]
    Rejected { url: String, status: u16 },

    #[error("Malformed upstream payload from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Rejected { status: 404, .. })
    }

    pub fn url(&self) -> &str {
        match self {
            UpstreamError::Unavailable { url, .. }
            | UpstreamError::Rejected { url, .. }
            | UpstreamError::Malformed { url, .. } => url,
        }
    }
}

/// A single offending query parameter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Query validation failure listing every offending field.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::error::ValidationError;
///
/// let mut error = ValidationError::default();
/// error.push("page", "Field is required");
/// error.push("gender", "Unknown value 'droid'");
/// assert_eq!(error.violations.len(), 2);
/// assert!(error.to_string().contains("page"));
/// ```
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid parameters: {}", self.fields().join(", "))
    }
}

impl ValidationError {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// Returns `Ok(value)` when nothing was recorded, `Err(self)` otherwise.
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, ValidationError> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Errors related to configuration loading, parsing, and validation.
///
/// # Example
///
/// ```rust
/// use swapi_query_engine::error::ConfigError;
///
/// let error = ConfigError::InvalidUpstreamUrl {
///     url: "not-a-url".to_string()
/// };
/// println!("Configuration error: {}", error);
/// ```
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {path}")]
    InvalidFile { path: std::path::PathBuf },

    #[error("Invalid upstream URL: {url}")]
    InvalidUpstreamUrl { url: String },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Trait for validating configuration structures.
pub trait Validate {
    type Error;
    fn validate(&self) -> std::result::Result<(), Self::Error>;
}
