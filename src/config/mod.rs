//! # Fleet Configuration
//!
//! Typed configuration for the stage engine, the staging synchronization
//! manager and logging. Every section has working defaults, so an empty or
//! missing configuration directory still yields a usable [`FleetConfig`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fleet_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! let local_site = &manager.config().engine.local_site;
//! let queue = &manager.config().staging.site_job_queue;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::constants::{DEFAULT_LOCAL_SITE, DEFAULT_NAMESPACE, DEFAULT_SITE_JOB_QUEUE};
use crate::error::{OrchestrationError, OrchestrationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub engine: EngineConfig,
    pub staging: StagingConfig,
    pub logging: LoggingConfig,
}

/// Stage engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Site id of this control plane; its outputs are never prefixed
    pub local_site: String,
    /// Namespace assumed when an activation does not name one
    pub default_namespace: String,
    /// Maximum nesting the context tracer walks into
    pub max_trace_depth: usize,
    /// Re-reads allowed when a pending task write loses an ETag race
    pub pending_task_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_site: DEFAULT_LOCAL_SITE.to_string(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            max_trace_depth: 32,
            pending_task_retries: 5,
        }
    }
}

/// Staging synchronization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Global queue of site ids awaiting a poll
    pub site_job_queue: String,
    /// Namespace catalogs are fetched from
    pub catalog_namespace: String,
    pub poll_interval_ms: u64,
    pub user: String,
    pub password: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            site_job_queue: DEFAULT_SITE_JOB_QUEUE.to_string(),
            catalog_namespace: DEFAULT_NAMESPACE.to_string(),
            poll_interval_ms: 1000,
            user: String::new(),
            password: String::new(),
        }
    }
}

impl StagingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to `RUST_LOG`, then an environment default
    pub level: Option<String>,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl FleetConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> OrchestrationResult<()> {
        if self.engine.local_site.trim().is_empty() {
            return Err(OrchestrationError::Configuration(
                "engine.local_site must not be empty".to_string(),
            ));
        }
        if self.engine.max_trace_depth == 0 {
            return Err(OrchestrationError::Configuration(
                "engine.max_trace_depth must be greater than 0".to_string(),
            ));
        }
        if self.staging.site_job_queue.trim().is_empty() {
            return Err(OrchestrationError::Configuration(
                "staging.site_job_queue must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
