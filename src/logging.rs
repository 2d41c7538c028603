//! # Structured Logging Module
//!
//! Environment-aware structured logging for the tower event loop.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::models::PsId;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    init_structured_logging_with(false);
}

/// Initialize structured logging, optionally emitting JSON lines. Only the
/// first call has an effect.
pub fn init_structured_logging_with(json: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter = || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level))
        };

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter())
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter())
                .boxed()
        };

        // A global subscriber may already be installed by the embedding process
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            level = %log_level,
            json = json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TOWER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for pit stop operations
pub fn log_ps_operation(operation: &str, ps_id: PsId, state: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        ps_id = ps_id,
        state = %state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PS_OPERATION"
    );
}

/// Log structured data for platform operations
pub fn log_platform_operation(operation: &str, plt_id: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        plt_id = %plt_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PLATFORM_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging_with(true);
        log_ps_operation("test", 1, "REQUESTED", None);
    }
}
