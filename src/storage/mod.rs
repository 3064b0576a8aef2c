//! # Storage Collaborators
//!
//! Uniform key-value and named-queue contracts the core persists through.
//! Backends (HTTP, Redis, ...) live outside this crate; the in-memory
//! implementations here back single-process deployments and tests.

pub mod memory;
pub mod queue;

use crate::error::OrchestrationResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::InMemoryStateStore;
pub use queue::{InMemoryQueueProvider, QueueProvider};

/// Logical collection an entry belongs to, alongside its namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateCollection {
    pub group: &'static str,
    pub resource: &'static str,
}

impl StateCollection {
    pub const PENDING_TASKS: StateCollection = StateCollection {
        group: "workflow.fleet",
        resource: "pendingtasks",
    };

    pub const STAGING_CACHE: StateCollection = StateCollection {
        group: "federation.fleet",
        resource: "catalogcache",
    };
}

/// A stored entry and its change token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub id: String,
    pub body: Value,
    /// Assigned by the store on every write
    #[serde(default)]
    pub etag: String,
}

impl StateEntry {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
            etag: String::new(),
        }
    }
}

/// Condition an upsert must satisfy to be applied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpsertPrecondition {
    /// Write unconditionally
    #[default]
    None,
    /// Write only if no entry exists for the id
    DoesNotExist,
    /// Write only if the stored entry carries this ETag
    MatchesETag(String),
}

/// Key-value storage contract.
///
/// Missing entries are reported as `OrchestrationError::NotFound`; a failed
/// precondition as `OrchestrationError::Conflict`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(
        &self,
        collection: StateCollection,
        namespace: &str,
        id: &str,
    ) -> OrchestrationResult<StateEntry>;

    /// Insert or replace an entry, returning its new ETag
    async fn upsert(
        &self,
        collection: StateCollection,
        namespace: &str,
        entry: StateEntry,
        precondition: UpsertPrecondition,
    ) -> OrchestrationResult<String>;

    async fn delete(
        &self,
        collection: StateCollection,
        namespace: &str,
        id: &str,
        precondition: UpsertPrecondition,
    ) -> OrchestrationResult<()>;

    async fn list(
        &self,
        collection: StateCollection,
        namespace: &str,
    ) -> OrchestrationResult<Vec<StateEntry>>;
}
