//! Caller loop over the stage engine.

use super::StageEngine;
use crate::models::{ActivationData, ActivationStatus, CampaignSpec, State};
use std::sync::Arc;
use tracing::{debug, warn};

/// Iteration guard for campaigns whose selectors never terminate
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Drives an activation through `handle_trigger_event` until the engine
/// stops handing back a next stage
#[derive(Clone)]
pub struct ActivationRunner {
    engine: Arc<StageEngine>,
    max_iterations: usize,
}

impl ActivationRunner {
    pub fn new(engine: Arc<StageEngine>) -> Self {
        Self {
            engine,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run until the activation finishes, pauses or fails; the last status is authoritative
    pub async fn run(&self, campaign: &CampaignSpec, activation: ActivationData) -> ActivationStatus {
        let mut current = activation;
        for iteration in 1..=self.max_iterations {
            let (status, next) = self.engine.handle_trigger_event(campaign, current).await;
            match next {
                Some(next) => {
                    debug!(iteration, next_stage = %next.stage, "Advancing activation");
                    current = next;
                }
                None => return status,
            }
        }

        warn!(max_iterations = self.max_iterations, stage = %current.stage, "Activation did not terminate");
        let mut status = ActivationStatus::for_stage(current.stage);
        status.fail(
            State::InternalError,
            format!(
                "activation exceeded {} stage executions without terminating",
                self.max_iterations
            ),
        );
        status
    }
}
