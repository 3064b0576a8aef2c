//! # Staging Synchronization
//!
//! Propagates catalog changes to remote sites with at-least-once delivery.
//!
//! A global queue holds the ids of sites that want a staging pass. Each
//! [`StagingManager::poll`] tick takes one site off that queue, compares every
//! catalog's ETag with the one last propagated to the site, and enqueues an
//! update job on the site's own queue for each catalog that changed. Site
//! agents drain their queue with [`StagingManager::get_batch_for_site`].
//!
//! Propagation is idempotent: an unchanged catalog is never enqueued twice,
//! and one failing catalog never blocks the others.

pub mod catalog;

use crate::config::StagingConfig;
use crate::constants::JOB_SITE_METADATA;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::Event;
use crate::logging::log_staging_operation;
use crate::metrics::EngineMetrics;
use crate::models::{Catalog, JobData};
use crate::storage::{QueueProvider, StateCollection, StateEntry, StateStore, UpsertPrecondition};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use catalog::{CatalogClient, Credentials, InMemoryCatalogClient};

/// What one poll tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// The site taken off the dispatch queue, if any
    pub site: Option<String>,
    pub enqueued: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct StagingManager {
    config: StagingConfig,
    queues: Arc<dyn QueueProvider>,
    cache: Arc<dyn StateStore>,
    catalogs: Arc<dyn CatalogClient>,
    metrics: Arc<EngineMetrics>,
}

impl StagingManager {
    pub fn new(
        config: StagingConfig,
        queues: Arc<dyn QueueProvider>,
        cache: Arc<dyn StateStore>,
        catalogs: Arc<dyn CatalogClient>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            config,
            queues,
            cache,
            catalogs,
            metrics,
        }
    }

    pub fn site_job_queue(&self) -> &str {
        &self.config.site_job_queue
    }

    /// One cooperative staging tick; a no-op when no site is waiting
    pub async fn poll(&self) -> OrchestrationResult<PollReport> {
        let queue = &self.config.site_job_queue;
        if self.queues.size(queue).await == 0 {
            return Ok(PollReport::default());
        }
        let site = match self.queues.dequeue(queue).await {
            Some(Value::String(site)) if !site.is_empty() => site,
            Some(other) => {
                warn!(queue = %queue, item = %other, "Dropping malformed site marker");
                return Ok(PollReport::default());
            }
            None => return Ok(PollReport::default()),
        };

        let credentials = Credentials::new(&self.config.user, &self.config.password);
        let catalogs = match self
            .catalogs
            .get_catalogs(&self.config.catalog_namespace, &credentials)
            .await
        {
            Ok(catalogs) => catalogs,
            Err(e) => {
                // Keep the site in rotation so the next tick retries it
                self.queues.enqueue(queue, Value::String(site.clone())).await;
                error!(site = %site, error = %e, "Failed to fetch catalogs");
                return Err(e);
            }
        };

        let mut report = PollReport {
            site: Some(site.clone()),
            ..Default::default()
        };
        for catalog in &catalogs {
            match self.stage_catalog(&site, catalog).await {
                Ok(true) => report.enqueued += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(site = %site, catalog = %catalog.name, error = %e, "Skipping catalog");
                }
            }
        }

        log_staging_operation(
            "poll",
            Some(&site),
            None,
            "complete",
            Some(&format!(
                "enqueued={} skipped={} failed={}",
                report.enqueued, report.skipped, report.failed
            )),
        );
        Ok(report)
    }

    /// Enqueue an update job for a changed catalog. Returns false when the
    /// site already has the catalog's current ETag.
    async fn stage_catalog(&self, site: &str, catalog: &Catalog) -> OrchestrationResult<bool> {
        let key = format!("{site}-{}", catalog.name);
        let namespace = if catalog.namespace.is_empty() {
            self.config.catalog_namespace.as_str()
        } else {
            catalog.namespace.as_str()
        };

        match self
            .cache
            .get(StateCollection::STAGING_CACHE, namespace, &key)
            .await
        {
            Ok(entry) if entry.body.as_str() == Some(catalog.etag.as_str()) => {
                self.metrics.record_staging_skip();
                debug!(key = %key, etag = %catalog.etag, "Catalog already propagated");
                return Ok(false);
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                // Delivery is at-least-once: a duplicate job beats a missed change
                warn!(key = %key, error = %e, "Catalog cache unreadable; enqueuing anyway");
            }
        }

        let job = JobData::update(catalog.name.clone(), serde_json::to_value(catalog)?);
        self.queues.enqueue(site, serde_json::to_value(&job)?).await;
        self.metrics.record_staging_job();

        self.cache
            .upsert(
                StateCollection::STAGING_CACHE,
                namespace,
                StateEntry::new(key, Value::String(catalog.etag.clone())),
                UpsertPrecondition::None,
            )
            .await?;

        log_staging_operation("enqueue", Some(site), Some(&catalog.name), "queued", None);
        Ok(true)
    }

    /// Queue a job for the site named in the event's `site` metadata and put
    /// the site back in rotation
    pub async fn handle_job_event(&self, event: &Event) -> OrchestrationResult<()> {
        let site = event
            .metadata
            .get(JOB_SITE_METADATA)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                OrchestrationError::BadRequest(format!(
                    "job event is missing '{JOB_SITE_METADATA}' metadata"
                ))
            })?;
        let job: JobData = serde_json::from_value(event.body.clone())
            .map_err(|e| OrchestrationError::BadRequest(format!("invalid job body: {e}")))?;

        self.queues
            .enqueue(&self.config.site_job_queue, Value::String(site.clone()))
            .await;
        self.queues.enqueue(site, serde_json::to_value(&job)?).await;
        self.metrics.record_staging_job();

        info!(site = %site, job = %job.id, action = ?job.action, "Queued staging job");
        Ok(())
    }

    /// Pull up to `count` jobs off a site's queue.
    ///
    /// The site marker is re-enqueued first so the site stays in rotation.
    /// Malformed entries are moved to the back of the queue rather than
    /// dropped; each entry present at the start is looked at most once.
    pub async fn get_batch_for_site(&self, site: &str, count: usize) -> OrchestrationResult<Vec<JobData>> {
        self.queues
            .enqueue(&self.config.site_job_queue, Value::String(site.to_string()))
            .await;

        let mut remaining = self.queues.size(site).await;
        let mut jobs = Vec::with_capacity(count.min(remaining));
        while jobs.len() < count && remaining > 0 {
            remaining -= 1;
            let Some(item) = self.queues.dequeue(site).await else {
                break;
            };
            match serde_json::from_value::<JobData>(item.clone()) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    warn!(site = %site, error = %e, "Re-queuing malformed job");
                    self.queues.enqueue(site, item).await;
                }
            }
        }

        debug!(site = %site, count = jobs.len(), "Served job batch");
        Ok(jobs)
    }

    /// Run `poll` every `interval` until `shutdown` flips to true
    pub fn spawn_poller(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "Staging poller started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.poll().await {
                            error!(error = %e, "Staging poll failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Staging poller stopped");
        })
    }
}
