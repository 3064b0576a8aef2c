//! Catalog API boundary used by the staging manager.

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::models::Catalog;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Credentials presented to the catalog API
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***REDACTED***")
            .finish()
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Every catalog in `namespace` with its current ETag
    async fn get_catalogs(
        &self,
        namespace: &str,
        credentials: &Credentials,
    ) -> OrchestrationResult<Vec<Catalog>>;
}

/// Catalog client serving a fixed, replaceable set (for testing and embedding)
#[derive(Debug, Default)]
pub struct InMemoryCatalogClient {
    catalogs: RwLock<Vec<Catalog>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryCatalogClient {
    pub fn new(catalogs: Vec<Catalog>) -> Self {
        Self {
            catalogs: RwLock::new(catalogs),
            failure: RwLock::new(None),
        }
    }

    pub fn set_catalogs(&self, catalogs: Vec<Catalog>) {
        *self.catalogs.write() = catalogs;
        *self.failure.write() = None;
    }

    /// Make every subsequent fetch fail until `set_catalogs` is called
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write() = Some(reason.into());
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalogClient {
    async fn get_catalogs(
        &self,
        namespace: &str,
        _credentials: &Credentials,
    ) -> OrchestrationResult<Vec<Catalog>> {
        if let Some(reason) = self.failure.read().clone() {
            return Err(OrchestrationError::InternalError(reason));
        }
        Ok(self
            .catalogs
            .read()
            .iter()
            .filter(|c| c.namespace.is_empty() || c.namespace == namespace)
            .cloned()
            .collect())
    }
}
