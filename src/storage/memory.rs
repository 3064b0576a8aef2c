//! In-memory state store with ETag preconditions.

use super::{StateCollection, StateEntry, StateStore, UpsertPrecondition};
use crate::error::{OrchestrationError, OrchestrationResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type StoreKey = (StateCollection, String, String);

/// Thread-safe key-value store; ETags are monotonically increasing integers
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: DashMap<StoreKey, StateEntry>,
    next_etag: AtomicU64,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all collections (for testing)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(collection: StateCollection, namespace: &str, id: &str) -> StoreKey {
        (collection, namespace.to_string(), id.to_string())
    }

    fn not_found(collection: StateCollection, namespace: &str, id: &str) -> OrchestrationError {
        OrchestrationError::NotFound(format!(
            "{}/{} entry '{id}' not found in namespace '{namespace}'",
            collection.group, collection.resource
        ))
    }

    fn check(
        existing: Option<&StateEntry>,
        precondition: &UpsertPrecondition,
        id: &str,
    ) -> OrchestrationResult<()> {
        match (precondition, existing) {
            (UpsertPrecondition::None, _) => Ok(()),
            (UpsertPrecondition::DoesNotExist, None) => Ok(()),
            (UpsertPrecondition::DoesNotExist, Some(_)) => Err(OrchestrationError::Conflict(
                format!("entry '{id}' already exists"),
            )),
            (UpsertPrecondition::MatchesETag(expected), Some(current))
                if &current.etag == expected =>
            {
                Ok(())
            }
            (UpsertPrecondition::MatchesETag(expected), current) => {
                Err(OrchestrationError::Conflict(format!(
                    "entry '{id}' etag mismatch: expected {expected}, found {}",
                    current.map(|c| c.etag.as_str()).unwrap_or("<none>")
                )))
            }
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(
        &self,
        collection: StateCollection,
        namespace: &str,
        id: &str,
    ) -> OrchestrationResult<StateEntry> {
        self.entries
            .get(&Self::key(collection, namespace, id))
            .map(|entry| entry.clone())
            .ok_or_else(|| Self::not_found(collection, namespace, id))
    }

    async fn upsert(
        &self,
        collection: StateCollection,
        namespace: &str,
        mut entry: StateEntry,
        precondition: UpsertPrecondition,
    ) -> OrchestrationResult<String> {
        let id = entry.id.clone();
        let etag = (self.next_etag.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        entry.etag = etag.clone();

        match self.entries.entry(Self::key(collection, namespace, &id)) {
            Entry::Occupied(mut occupied) => {
                Self::check(Some(occupied.get()), &precondition, &id)?;
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                Self::check(None, &precondition, &id)?;
                vacant.insert(entry);
            }
        }

        debug!(resource = collection.resource, namespace, id = %id, etag = %etag, "State upserted");
        Ok(etag)
    }

    async fn delete(
        &self,
        collection: StateCollection,
        namespace: &str,
        id: &str,
        precondition: UpsertPrecondition,
    ) -> OrchestrationResult<()> {
        match self.entries.entry(Self::key(collection, namespace, id)) {
            Entry::Occupied(occupied) => {
                Self::check(Some(occupied.get()), &precondition, id)?;
                occupied.remove();
                Ok(())
            }
            Entry::Vacant(_) => Err(Self::not_found(collection, namespace, id)),
        }
    }

    async fn list(
        &self,
        collection: StateCollection,
        namespace: &str,
    ) -> OrchestrationResult<Vec<StateEntry>> {
        let mut entries: Vec<StateEntry> = self
            .entries
            .iter()
            .filter(|item| item.key().0 == collection && item.key().1 == namespace)
            .map(|item| item.value().clone())
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }
}
