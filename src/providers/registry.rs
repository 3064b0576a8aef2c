//! # Provider Registry
//!
//! Maps provider identifiers to constructors and performs the context
//! injection step every construction goes through. This is the invocation
//! adapter the stage engine uses to turn `(provider id, config)` into a
//! runnable [`StageProvider`].
//!
//! ## Usage
//!
//! ```rust
//! use fleet_core::events::InMemoryEventBus;
//! use fleet_core::providers::{ProviderContext, ProviderRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = ProviderRegistry::with_builtin_providers();
//! let context = ProviderContext {
//!     site_id: "hq".to_string(),
//!     event_bus: Arc::new(InMemoryEventBus::default()),
//! };
//! let provider = registry
//!     .create("providers.stage.counter", &json!({}), &context)
//!     .unwrap();
//! assert!(!provider.is_remote_proxy());
//! ```

use super::{
    CounterStageProvider, MockStageProvider, ProviderContext, RemoteStageProvider, StageProvider,
};
use crate::constants::providers;
use crate::error::{OrchestrationError, OrchestrationResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a provider from its opaque configuration
pub type ProviderConstructor =
    Arc<dyn Fn(&Value) -> OrchestrationResult<Box<dyn StageProvider>> + Send + Sync>;

/// Thread-safe registry of provider constructors
#[derive(Default)]
pub struct ProviderRegistry {
    constructors: RwLock<HashMap<String, ProviderConstructor>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the counter, mock and remote providers installed
    pub fn with_builtin_providers() -> Self {
        let registry = Self::new();
        registry.register(providers::COUNTER, |config| {
            Ok(Box::new(CounterStageProvider::from_config(config)?) as Box<dyn StageProvider>)
        });
        registry.register(providers::MOCK, |config| {
            Ok(Box::new(MockStageProvider::from_config(config)?) as Box<dyn StageProvider>)
        });
        registry.register(providers::REMOTE, |config| {
            Ok(Box::new(RemoteStageProvider::from_config(config)?) as Box<dyn StageProvider>)
        });
        registry
    }

    /// Register (or replace) the constructor for a provider id
    pub fn register<F>(&self, provider_id: impl Into<String>, constructor: F)
    where
        F: Fn(&Value) -> OrchestrationResult<Box<dyn StageProvider>> + Send + Sync + 'static,
    {
        let provider_id = provider_id.into();
        debug!(provider_id = %provider_id, "Registering stage provider");
        self.constructors
            .write()
            .insert(provider_id, Arc::new(constructor));
    }

    pub fn is_registered(&self, provider_id: &str) -> bool {
        self.constructors.read().contains_key(provider_id)
    }

    /// Registered provider ids, sorted
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.constructors.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Construct a provider and inject orchestration context if it asks for it
    ///
    /// Unknown ids fail with `NotFound`; a constructor failure is reported as
    /// `InternalError` carrying the provider id.
    pub fn create(
        &self,
        provider_id: &str,
        config: &Value,
        context: &ProviderContext,
    ) -> OrchestrationResult<Arc<dyn StageProvider>> {
        // Clone the constructor out so user code never runs under the lock
        let constructor = self
            .constructors
            .read()
            .get(provider_id)
            .cloned()
            .ok_or_else(|| {
                OrchestrationError::NotFound(format!("provider '{provider_id}' is not registered"))
            })?;

        let mut provider = constructor(config).map_err(|e| {
            OrchestrationError::InternalError(format!(
                "failed to create provider '{provider_id}': {e}"
            ))
        })?;

        if let Some(aware) = provider.context_aware() {
            aware.set_context(context.clone());
        }

        info!(provider_id = %provider_id, site_id = %context.site_id, "Created stage provider");
        Ok(Arc::from(provider))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}
