//! # Structured Logging Module
//!
//! Environment-aware structured logging for the stage engine and the staging
//! synchronization manager, plus helpers that emit one structured record per
//! engine operation.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging. Safe to call more than once; only the
/// first call installs a subscriber.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = match (&config.level, std::env::var("RUST_LOG")) {
            (Some(level), _) => EnvFilter::new(level),
            (None, Ok(directive)) => EnvFilter::new(directive),
            (None, Err(_)) => EnvFilter::new(get_log_level(&environment)),
        };

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FLEET_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for stage engine operations
pub fn log_stage_operation(
    operation: &str,
    campaign: &str,
    activation: &str,
    stage: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        campaign = %campaign,
        activation = %activation,
        stage = %stage,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "STAGE_OPERATION"
    );
}

/// Log structured data for staging synchronization operations
pub fn log_staging_operation(
    operation: &str,
    site: Option<&str>,
    catalog: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        site = site,
        catalog = catalog,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "STAGING_OPERATION"
    );
}
