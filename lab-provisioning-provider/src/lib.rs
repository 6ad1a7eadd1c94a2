pub mod error;
pub mod models;
pub mod simulated;

use async_trait::async_trait;
pub use error::ProviderError;
pub use models::{
    AccessKey, AccessRight, AccessTier, ImportRequest, ImportTicket, ProvisioningState,
    PublicAccess, ResourceHandle, ResourceKind, ResourceRef, ResourceSpec, TlsVersion,
};
pub use simulated::SimulatedProvider;

/// Resource management capability of a cloud. Every call is a network round
/// trip from the caller's point of view.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Must not have side effects.
    async fn exists(&self, resource: &ResourceRef) -> Result<bool, ProviderError>;

    /// Fails with [`ProviderError::Conflict`] if the name is taken and with
    /// [`ProviderError::NotFound`] if the parent is missing.
    async fn create(
        &self,
        resource: &ResourceRef,
        spec: ResourceSpec,
    ) -> Result<ResourceHandle, ProviderError>;

    async fn get(&self, resource: &ResourceRef) -> Result<ResourceHandle, ProviderError>;

    /// Removes the resource together with everything nested below it.
    async fn delete(&self, handle: &ResourceHandle) -> Result<(), ProviderError>;

    async fn list_all(&self, kind: ResourceKind) -> Result<Vec<ResourceHandle>, ProviderError>;

    async fn fetch_access_key(&self, handle: &ResourceHandle) -> Result<AccessKey, ProviderError>;
}

/// Bulk data import into a database server.
#[async_trait]
pub trait BulkImport: Send + Sync {
    /// Returns as soon as the provider accepted the operation.
    async fn start_import(
        &self,
        server: &ResourceHandle,
        request: ImportRequest,
    ) -> Result<ImportTicket, ProviderError>;
}
