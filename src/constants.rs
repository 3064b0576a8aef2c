//! # System Constants
//!
//! Reserved keys, feed names and storage collections shared by the stage
//! engine, remote agents and the staging synchronization manager. The reserved
//! key strings are a wire contract: downstream expressions and remote site
//! agents read them by exact name.

/// Reserved keys carried in stage inputs and outputs
pub mod reserved {
    pub const CAMPAIGN: &str = "__campaign";
    pub const NAMESPACE: &str = "__namespace";
    pub const ACTIVATION: &str = "__activation";
    pub const ACTIVATION_GENERATION: &str = "__activationGeneration";
    pub const STAGE: &str = "__stage";
    pub const PREVIOUS_STAGE: &str = "__previousStage";
    pub const SITE: &str = "__site";
    pub const SCHEDULE: &str = "__schedule";
    pub const STATE: &str = "__state";
    pub const STATUS: &str = "__status";
    pub const ERROR: &str = "__error";

    /// Prefix shared by every reserved key
    pub const PREFIX: &str = "__";

    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(PREFIX)
    }
}

/// Event bus feeds used by the core
pub mod feeds {
    /// Deferred stage execution requests
    pub const SCHEDULE: &str = "schedule";
    /// Remote proxy notifications
    pub const REMOTE: &str = "remote";
    /// Staging job notifications
    pub const JOB: &str = "job";
}

/// Built-in provider identifiers
pub mod providers {
    pub const COUNTER: &str = "providers.stage.counter";
    pub const MOCK: &str = "providers.stage.mock";
    pub const REMOTE: &str = "providers.stage.remote";
}

/// Namespace used when an activation or status does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Site id used when a stage has no contexts expression
pub const DEFAULT_LOCAL_SITE: &str = "hq";

/// Global queue of site ids awaiting a staging pass
pub const DEFAULT_SITE_JOB_QUEUE: &str = "site-job-queue";

/// Event metadata key naming the target site of a staging job
pub const JOB_SITE_METADATA: &str = "site";
