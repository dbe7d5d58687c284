//! # Structured Logging Module
//!
//! Environment-aware structured logging for batch and workflow runs.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` wins when set; otherwise the level follows the environment
/// name. Set `REQFLOW_LOG_FORMAT=json` for machine-readable output.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("REQFLOW_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        // A global subscriber may already be installed by the embedding application
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(environment = %environment, json = json, "Structured logging initialized");
    });
}

fn get_environment() -> String {
    std::env::var("REQFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log the aggregate outcome of one batch call
pub fn log_batch_operation(
    operation: &str,
    total: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
) {
    tracing::info!(
        operation = %operation,
        total = total,
        succeeded = succeeded,
        failed = failed,
        cancelled = cancelled,
        "📦 BATCH_OPERATION"
    );
}

/// Log a workflow step transition
pub fn log_workflow_step(workflow: &str, step: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        workflow = %workflow,
        step = %step,
        status = %status,
        details = details,
        "🔧 WORKFLOW_STEP"
    );
}
