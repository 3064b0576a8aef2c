//! # Stage Providers
//!
//! Pluggable execution units a stage runs. Every provider implements
//! [`StageProvider`]; providers that need orchestration context (the local
//! site id and the event bus) additionally expose [`ContextAware`], which the
//! [`ProviderRegistry`] checks for and injects once at construction.

pub mod counter;
pub mod mock;
pub mod registry;
pub mod remote;

use crate::error::OrchestrationResult;
use crate::events::EventBus;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use counter::CounterStageProvider;
pub use mock::MockStageProvider;
pub use registry::{ProviderConstructor, ProviderRegistry};
pub use remote::RemoteStageProvider;

/// Result of one `process` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutcome {
    pub outputs: HashMap<String, Value>,
    /// The provider will complete asynchronously; the stage must pause
    pub pause_requested: bool,
}

impl StageOutcome {
    pub fn completed(outputs: HashMap<String, Value>) -> Self {
        Self {
            outputs,
            pause_requested: false,
        }
    }

    pub fn paused(outputs: HashMap<String, Value>) -> Self {
        Self {
            outputs,
            pause_requested: true,
        }
    }
}

/// Orchestration context injected into context-aware providers.
///
/// One provider instance serves every site of a fan-out, so `site_id` is the
/// orchestrating site. The site a call runs for is the `__site` input.
#[derive(Clone)]
pub struct ProviderContext {
    pub site_id: String,
    pub event_bus: Arc<dyn EventBus>,
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("site_id", &self.site_id)
            .finish_non_exhaustive()
    }
}

/// Stage execution unit
#[async_trait]
pub trait StageProvider: Send + Sync {
    /// Run the stage's business logic against one site's inputs
    ///
    /// The inputs carry the reserved `__` keys (campaign, activation, stage,
    /// site, ...) next to the traced stage inputs.
    async fn process(&self, inputs: &HashMap<String, Value>) -> OrchestrationResult<StageOutcome>;

    /// Remote proxy units forward execution to a site agent and already
    /// understand scheduling, so the engine never defers them locally
    fn is_remote_proxy(&self) -> bool {
        false
    }

    /// Second capability: orchestration context injection
    fn context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        None
    }
}

/// Providers that need the site id or the event bus
pub trait ContextAware {
    fn set_context(&mut self, context: ProviderContext);
}
