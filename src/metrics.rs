//! # Engine Metrics
//!
//! Counters owned by the caller and handed to the stage engine, the site
//! fan-out and the staging manager at construction time.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineMetrics {
    stages_executed: AtomicU64,
    site_executions: AtomicU64,
    site_failures: AtomicU64,
    pauses: AtomicU64,
    resumes: AtomicU64,
    scheduled: AtomicU64,
    staging_jobs_enqueued: AtomicU64,
    staging_skipped: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub stages_executed: u64,
    pub site_executions: u64,
    pub site_failures: u64,
    pub pauses: u64,
    pub resumes: u64,
    pub scheduled: u64,
    pub staging_jobs_enqueued: u64,
    pub staging_skipped: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stage(&self) {
        self.stages_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_site_execution(&self, failed: bool) {
        self.site_executions.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.site_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_staging_job(&self) {
        self.staging_jobs_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_staging_skip(&self) {
        self.staging_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stages_executed: self.stages_executed.load(Ordering::Relaxed),
            site_executions: self.site_executions.load(Ordering::Relaxed),
            site_failures: self.site_failures.load(Ordering::Relaxed),
            pauses: self.pauses.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            scheduled: self.scheduled.load(Ordering::Relaxed),
            staging_jobs_enqueued: self.staging_jobs_enqueued.load(Ordering::Relaxed),
            staging_skipped: self.staging_skipped.load(Ordering::Relaxed),
        }
    }
}
