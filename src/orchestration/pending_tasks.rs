//! # Pending Task Store
//!
//! Durable bookkeeping for fanned-out stages waiting on asynchronous site
//! completions. Records live in the `pendingtasks` collection under the
//! activation's namespace, keyed `{campaign}-{activation}-{generation}`.
//!
//! Every load hands back the record's ETag. Writers pass it back to `save`
//! and `delete` so two resumes racing on the same key cannot both apply: the
//! loser gets `Conflict` and re-reads.

use crate::error::OrchestrationResult;
use crate::models::PendingTask;
use crate::storage::{StateCollection, StateEntry, StateStore, UpsertPrecondition};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct PendingTaskStore {
    store: Arc<dyn StateStore>,
}

impl PendingTaskStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Upsert a record, returning its new ETag.
    ///
    /// With `expected_etag` set the write only applies if the stored record
    /// is unchanged since it was loaded; otherwise it overwrites.
    pub async fn save(
        &self,
        key: &str,
        namespace: &str,
        task: &PendingTask,
        expected_etag: Option<&str>,
    ) -> OrchestrationResult<String> {
        let entry = StateEntry::new(key, serde_json::to_value(task)?);
        let etag = self
            .store
            .upsert(
                StateCollection::PENDING_TASKS,
                namespace,
                entry,
                precondition(expected_etag),
            )
            .await?;
        debug!(key = %key, namespace = %namespace, sites = task.sites.len(), "Saved pending task");
        Ok(etag)
    }

    /// Load a record and its ETag; `NotFound` when absent
    pub async fn load(&self, key: &str, namespace: &str) -> OrchestrationResult<(PendingTask, String)> {
        let entry = self
            .store
            .get(StateCollection::PENDING_TASKS, namespace, key)
            .await?;
        let task = serde_json::from_value(entry.body)?;
        Ok((task, entry.etag))
    }

    pub async fn delete(
        &self,
        key: &str,
        namespace: &str,
        expected_etag: Option<&str>,
    ) -> OrchestrationResult<()> {
        self.store
            .delete(
                StateCollection::PENDING_TASKS,
                namespace,
                key,
                precondition(expected_etag),
            )
            .await?;
        debug!(key = %key, namespace = %namespace, "Deleted pending task");
        Ok(())
    }
}

fn precondition(expected_etag: Option<&str>) -> UpsertPrecondition {
    expected_etag
        .map(|etag| UpsertPrecondition::MatchesETag(etag.to_string()))
        .unwrap_or_default()
}
