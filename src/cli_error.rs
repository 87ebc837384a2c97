//! CLI error handling with recovery suggestions

use crate::error::*;
use colored::Colorize;
use std::error::Error;

/// Trait for providing user-friendly error messages with recovery suggestions
pub trait CliError {
    fn user_message(&self) -> String;
    fn recovery_suggestion(&self) -> Option<String>;
}

impl CliError for EngineError {
    fn user_message(&self) -> String {
        match self {
            EngineError::Upstream(e) => format!("{} Upstream Error: {}", "🌐".red(), e),
            EngineError::PartialAggregation { page, source } => format!(
                "{} Collection could not be fetched (page {}): {}",
                "📚".red(),
                page,
                source
            ),
            EngineError::Validation(e) => format!("{} Invalid Query: {}", "🔎".red(), e),
            EngineError::Config(e) => format!("{} Configuration Error: {}", "⚙️".red(), e),
            EngineError::Io(e) => format!("{} File System Error: {}", "📁".red(), e),
            EngineError::Network(e) => format!("{} Network Error: {}", "🌐".red(), e),
            EngineError::Json(e) => format!("{} JSON Error: {}", "📝".red(), e),
            EngineError::TomlDe(e) => format!("{} TOML Parse Error: {}", "📝".red(), e),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            EngineError::Upstream(e) => e.recovery_suggestion(),
            EngineError::PartialAggregation { source, .. } => source.recovery_suggestion(),
            EngineError::Config(e) => e.recovery_suggestion(),
            EngineError::Validation(e) => e.recovery_suggestion(),
            EngineError::Network(e) if e.is_builder() => Some(format!(
                "{} The HTTP client could not be built; check the user agent in your configuration",
                "💡".yellow()
            )),
            EngineError::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Some(format!(
                "{} Check file permissions or run with appropriate privileges",
                "💡".yellow()
            )),
            _ => None,
        }
    }
}

impl CliError for UpstreamError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            UpstreamError::Unavailable { attempts, .. } => Some(format!(
                "{} The upstream service did not answer after {} attempts\n{} Check your internet connection or try again later\n{} Increase [upstream] timeout or retry_attempts in sqe.toml",
                "💡".yellow(),
                attempts.to_string().bright_white(),
                "💡".yellow(),
                "💡".yellow()
            )),
            UpstreamError::Rejected { status: 404, .. } => Some(format!(
                "{} The requested page does not exist upstream; try a lower --page",
                "💡".yellow()
            )),
            UpstreamError::Rejected { .. } => None,
            UpstreamError::Malformed { url, .. } => Some(format!(
                "{} Check that the upstream URL points at a SWAPI-compatible service: {}",
                "💡".yellow(),
                url.bright_white()
            )),
        }
    }
}

impl CliError for ConfigError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            ConfigError::InvalidFile { path } => Some(format!(
                "{} Check that {} exists and is a valid TOML file",
                "💡".yellow(),
                path.display().to_string().bright_white()
            )),
            ConfigError::InvalidUpstreamUrl { url } => Some(format!(
                "{} Check the upstream URL: {}\n{} The URL should start with http:// or https://",
                "💡".yellow(),
                url.bright_white(),
                "💡".yellow()
            )),
            ConfigError::InvalidValue { key, .. } => Some(format!(
                "{} Fix the value of '{}' in sqe.toml or the matching SQE_ environment variable",
                "💡".yellow(),
                key.bright_white()
            )),
            ConfigError::ValidationFailed { .. } => None,
        }
    }
}

impl CliError for ValidationError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn recovery_suggestion(&self) -> Option<String> {
        let lines: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{} {}: {}", "💡".yellow(), v.field.bright_white(), v.message))
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

/// Exit code for a failure that happened outside the request pipeline.
pub fn get_exit_code(error: &EngineError) -> i32 {
    match error {
        EngineError::Config(_) | EngineError::TomlDe(_) | EngineError::Io(_) => 1,
        other => exit_code_for_status(other.status_code()),
    }
}

/// 0 for success, 2 for client errors, 3 for server errors.
pub fn exit_code_for_status(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 2,
        _ => 3,
    }
}

/// Print error with recovery suggestions
pub fn print_error_with_suggestions(error: &EngineError) {
    tracing::error!(
        status = error.status_code(),
        error_message = %error,
        "Query engine operation failed"
    );

    eprintln!("{}", error.user_message());

    if let Some(suggestion) = error.recovery_suggestion() {
        eprintln!("\n{suggestion}");
    }

    eprintln!("\n{} Run 'sqe --help' for more information", "ℹ️".blue());

    if std::env::var("SQE_DEBUG").is_ok()
        || std::env::var("RUST_LOG")
            .map(|s| s.contains("debug"))
            .unwrap_or(false)
    {
        eprintln!("\n{} Debug information:", "🔧".dimmed());
        print_error_chain(error);
    }
}

fn print_error_chain(error: &EngineError) {
    eprintln!("• {error}");

    let mut source = error.source();
    let mut depth = 1;
    while let Some(err) = source {
        eprintln!("{}↳ {err}", "  ".repeat(depth));
        source = err.source();
        depth += 1;
        if depth > 10 {
            eprintln!("{}↳ ...", "  ".repeat(depth));
            break;
        }
    }
}
