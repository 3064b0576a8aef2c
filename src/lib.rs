#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fleet Core
//!
//! Campaign orchestration core for edge and fleet deployments.
//!
//! ## Overview
//!
//! A campaign is a workflow of stages. Each stage runs a pluggable provider
//! against one or many sites; selector expressions choose the next stage; a
//! stage may pause until remote sites report back. Alongside the stage engine
//! sits a staging manager that propagates catalog changes to remote sites
//! through per-site job queues.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Stage engine, site fan-out, pending tasks, caller loop
//! - [`staging`] - Catalog change propagation to remote sites
//! - [`expression`] - `${{ ... }}` template evaluation and input tracing
//! - [`providers`] - Stage provider contract, registry and built-in providers
//! - [`models`] - Activations, campaigns, state codes, jobs
//! - [`storage`] - Key-value and named-queue contracts with in-memory backends
//! - [`events`] - Feed-addressed event bus
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use fleet_core::config::EngineConfig;
//! use fleet_core::events::InMemoryEventBus;
//! use fleet_core::metrics::EngineMetrics;
//! use fleet_core::models::{ActivationData, CampaignSpec, StageSpec, State};
//! use fleet_core::orchestration::{ActivationRunner, StageEngine};
//! use fleet_core::providers::ProviderRegistry;
//! use fleet_core::storage::InMemoryStateStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let engine = Arc::new(StageEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(ProviderRegistry::with_builtin_providers()),
//!     Arc::new(InMemoryStateStore::new()),
//!     Arc::new(InMemoryEventBus::default()),
//!     Arc::new(EngineMetrics::new()),
//! ));
//!
//! let campaign = CampaignSpec::new("count")
//!     .self_driving(true)
//!     .with_first_stage("test")
//!     .with_stage(
//!         "test",
//!         StageSpec::new("providers.stage.counter")
//!             .with_input("foo", 1)
//!             .with_input("foo.init", "${{$output(test,foo)}}")
//!             .with_selector("${{$if($lt($output(test,foo), 5), test, '')}}"),
//!     );
//!
//! let activation = engine
//!     .handle_activation_event(ActivationData::default(), &campaign, None)
//!     .unwrap();
//! let status = ActivationRunner::new(engine).run(&campaign, activation).await;
//!
//! assert_eq!(status.status, State::Done);
//! assert_eq!(status.outputs["foo"], 5);
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod expression;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod providers;
pub mod staging;
pub mod storage;

pub use config::{ConfigManager, EngineConfig, FleetConfig, LoggingConfig, StagingConfig};
pub use error::{OrchestrationError, OrchestrationResult};
pub use models::{ActivationData, ActivationStatus, CampaignSpec, StageSpec, State};
pub use orchestration::{ActivationRunner, StageEngine};
pub use staging::StagingManager;
