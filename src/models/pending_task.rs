use super::activation::StageOutputs;
use super::campaign::ProxySpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Persisted record of a paused multi-site stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTask {
    pub stage: String,
    /// Sites that have not reported back yet
    pub sites: BTreeSet<String>,
    #[serde(default)]
    pub outputs_by_stage: StageOutputs,
    /// Trigger inputs, carried into the stage that follows the resume
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub proxy: Option<ProxySpec>,
    /// `"{site}: {error}"` for every site that failed so far
    #[serde(default)]
    pub failures: Vec<String>,
}

impl PendingTask {
    /// Remove a reporting site. Returns false if the site was not outstanding.
    pub fn complete_site(&mut self, site: &str) -> bool {
        self.sites.remove(site)
    }

    pub fn is_complete(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
