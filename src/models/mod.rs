//! # Data Model
//!
//! Activation records, campaign definitions, persisted pending tasks and the
//! staging job types exchanged with remote site agents.

pub mod activation;
pub mod campaign;
pub mod job;
pub mod pending_task;
pub mod state;
pub mod task_result;

pub use activation::{pending_task_key, ActivationData, ActivationStatus, StageOutputs};
pub use campaign::{CampaignSpec, ProxySpec, StageSchedule, StageSpec};
pub use job::{Catalog, JobAction, JobData};
pub use pending_task::PendingTask;
pub use state::State;
pub use task_result::{ReservedEnvelope, ResumeIdentity, TaskResult};
