use std::sync::Arc;

use lab_provisioning_provider::{CloudProvider, ResourceRef};

use crate::error::ProvisioningError;

/// Answers "is this name taken" before anything gets created.
#[derive(Clone)]
pub struct ExistenceProber {
    provider: Arc<dyn CloudProvider>,
}

impl ExistenceProber {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self { provider }
    }

    pub async fn exists(&self, resource: &ResourceRef) -> Result<bool, ProvisioningError> {
        let exists = self.provider.exists(resource).await?;
        tracing::debug!(kind = %resource.kind, name = %resource.name, exists, "probed");
        Ok(exists)
    }
}
