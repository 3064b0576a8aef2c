use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobAction {
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

/// A change a remote site agent must apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub id: String,
    pub action: JobAction,
    #[serde(default)]
    pub body: Value,
}

impl JobData {
    pub fn update(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            action: JobAction::Update,
            body,
        }
    }
}

/// Catalog entry as returned by the catalog API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    /// Opaque change token; a new value means the catalog changed
    pub etag: String,
    #[serde(default)]
    pub spec: Value,
}
