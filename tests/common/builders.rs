//! Test harnesses and campaign builders shared by the integration suites.

#![allow(dead_code)]

use super::providers::register_test_providers;
use fleet_core::config::{EngineConfig, StagingConfig};
use fleet_core::constants::providers;
use fleet_core::events::InMemoryEventBus;
use fleet_core::metrics::EngineMetrics;
use fleet_core::models::{ActivationData, Catalog, CampaignSpec, StageSpec};
use fleet_core::orchestration::{ActivationRunner, StageEngine};
use fleet_core::providers::ProviderRegistry;
use fleet_core::staging::{InMemoryCatalogClient, StagingManager};
use fleet_core::storage::{InMemoryQueueProvider, InMemoryStateStore};
use serde_json::json;
use std::sync::Arc;

/// Engine wired to in-memory collaborators the test can inspect
pub struct EngineHarness {
    pub engine: Arc<StageEngine>,
    pub registry: Arc<ProviderRegistry>,
    pub store: Arc<InMemoryStateStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub metrics: Arc<EngineMetrics>,
}

impl EngineHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let registry = Arc::new(ProviderRegistry::with_builtin_providers());
        register_test_providers(&registry);
        let store = Arc::new(InMemoryStateStore::new());
        let bus = Arc::new(InMemoryEventBus::default());
        let metrics = Arc::new(EngineMetrics::new());
        let engine = Arc::new(StageEngine::new(
            config,
            registry.clone(),
            store.clone(),
            bus.clone(),
            metrics.clone(),
        ));
        Self {
            engine,
            registry,
            store,
            bus,
            metrics,
        }
    }

    pub fn runner(&self) -> ActivationRunner {
        ActivationRunner::new(self.engine.clone())
    }

    /// Resolve the starting activation for a campaign
    pub fn start(&self, campaign: &CampaignSpec) -> ActivationData {
        self.engine
            .handle_activation_event(activation(&campaign.name, ""), campaign, None)
            .expect("campaign should have a valid first stage")
    }
}

impl Default for EngineHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn activation(campaign: &str, stage: &str) -> ActivationData {
    ActivationData {
        campaign: campaign.to_string(),
        activation: format!("{campaign}-activation"),
        activation_generation: "1".to_string(),
        namespace: "default".to_string(),
        stage: stage.to_string(),
        ..Default::default()
    }
}

/// Counter stage feeding its own previous output back in as `{key}.init`
pub fn counter_stage(stage: &str, key: &str, delta: i64, selector: &str) -> StageSpec {
    StageSpec::new(providers::COUNTER)
        .with_input(key, delta)
        .with_input(
            format!("{key}.init"),
            format!("${{{{$output({stage},{key})}}}}"),
        )
        .with_selector(selector)
}

/// Self-driving single-stage loop on `test.foo`
pub fn counter_campaign(delta: i64, selector: &str) -> CampaignSpec {
    CampaignSpec::new("counter")
        .self_driving(true)
        .with_first_stage("test")
        .with_stage("test", counter_stage("test", "foo", delta, selector))
}

pub fn catalog(name: &str, etag: &str) -> Catalog {
    Catalog {
        name: name.to_string(),
        namespace: "default".to_string(),
        etag: etag.to_string(),
        spec: json!({ "name": name, "etag": etag }),
    }
}

/// Staging manager wired to in-memory collaborators
pub struct StagingHarness {
    pub manager: Arc<StagingManager>,
    pub queues: Arc<InMemoryQueueProvider>,
    pub cache: Arc<InMemoryStateStore>,
    pub catalogs: Arc<InMemoryCatalogClient>,
    pub metrics: Arc<EngineMetrics>,
}

impl StagingHarness {
    pub fn new(catalogs: Vec<Catalog>) -> Self {
        let queues = Arc::new(InMemoryQueueProvider::new());
        let cache = Arc::new(InMemoryStateStore::new());
        let client = Arc::new(InMemoryCatalogClient::new(catalogs));
        let metrics = Arc::new(EngineMetrics::new());
        let manager = Arc::new(StagingManager::new(
            StagingConfig::default(),
            queues.clone(),
            cache.clone(),
            client.clone(),
            metrics.clone(),
        ));
        Self {
            manager,
            queues,
            cache,
            catalogs: client,
            metrics,
        }
    }
}
