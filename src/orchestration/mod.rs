//! # Orchestration Engine
//!
//! The stage engine and the pieces it coordinates:
//!
//! - **StageEngine**: runs one stage per trigger, picks the next stage, pauses
//!   and resumes multi-site work
//! - **SiteFanOut**: runs a stage on every resolved site concurrently and
//!   aggregates the per-site outputs
//! - **PendingTaskStore**: ETag-guarded persistence of paused fan-outs
//! - **ActivationRunner**: the caller loop that chains stages to completion

pub mod engine;
pub mod fan_out;
pub mod pending_tasks;
pub mod runner;

pub use engine::StageEngine;
pub use fan_out::{FanOutResult, SiteFanOut, SiteRun};
pub use pending_tasks::PendingTaskStore;
pub use runner::{ActivationRunner, DEFAULT_MAX_ITERATIONS};
