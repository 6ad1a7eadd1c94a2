use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore as _;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::{
    AccessKey, ImportRequest, ImportTicket, ProvisioningState, ResourceHandle, ResourceKind,
    ResourceRef, ResourceSpec,
};
use crate::{BulkImport, CloudProvider, ProviderError};

#[derive(Default, Serialize, Deserialize)]
struct State {
    resources: BTreeMap<String, StoredResource>,
    imports: Vec<ImportTicket>,
    next_operation: u64,
}

#[derive(Clone, Serialize, Deserialize)]
struct StoredResource {
    handle: ResourceHandle,
    spec: Option<ResourceSpec>,
    access_key: Option<AccessKey>,
}

struct Fault {
    kind: ResourceKind,
    marker: String,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process stand-in for a cloud subscription: a single resource group,
/// optionally persisted to a JSON file between runs.
pub struct SimulatedProvider {
    resource_group: String,
    state: Mutex<State>,
    state_file: Option<PathBuf>,
    latency: Duration,
    max_in_flight: Option<usize>,
    in_flight: AtomicUsize,
    calls: AtomicUsize,
    created: AtomicUsize,
    faults: Vec<Fault>,
}

impl SimulatedProvider {
    pub fn new(resource_group: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            state: Mutex::default(),
            state_file: None,
            latency: Duration::ZERO,
            max_in_flight: None,
            in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            faults: Vec::new(),
        }
    }

    /// Loads earlier state from `path` if it exists and writes every change
    /// back to it.
    pub async fn open(
        resource_group: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, ProviderError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            state: Mutex::new(state),
            state_file: Some(path),
            ..Self::new(resource_group)
        })
    }

    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Calls beyond this many concurrent requests fail with
    /// [`ProviderError::RateLimited`].
    #[must_use]
    pub const fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    /// Creating (or importing) a `kind` whose name contains `marker` fails
    /// with a transient error.
    #[must_use]
    pub fn fail_creating(mut self, kind: ResourceKind, marker: impl Into<String>) -> Self {
        self.faults.push(Fault {
            kind,
            marker: marker.into(),
        });
        self
    }

    /// Number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of resources created so far, imported databases included.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub async fn imports(&self) -> Vec<ImportTicket> {
        self.state.lock().await.imports.clone()
    }

    /// The spec a resource was created with.
    pub async fn spec_of(&self, resource: &ResourceRef) -> Option<ResourceSpec> {
        self.state
            .lock()
            .await
            .resources
            .get(&resource.path())
            .and_then(|stored| stored.spec.clone())
    }

    async fn enter(&self) -> Result<InFlight<'_>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = InFlight(&self.in_flight);
        if let Some(max) = self.max_in_flight {
            if current > max {
                tracing::warn!(in_flight = current, max, "simulated provider throttling");
                return Err(ProviderError::RateLimited);
            }
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(guard)
    }

    fn check_faults(&self, resource: &ResourceRef) -> Result<(), ProviderError> {
        if self
            .faults
            .iter()
            .any(|fault| fault.kind == resource.kind && resource.name.contains(&fault.marker))
        {
            return Err(ProviderError::Transient(format!(
                "injected failure creating {resource}"
            )));
        }
        Ok(())
    }

    async fn persist(&self, state: &State) -> Result<(), ProviderError> {
        if let Some(path) = &self.state_file {
            tokio::fs::write(path, serde_json::to_vec_pretty(state)?).await?;
        }
        Ok(())
    }

    fn resource_id(&self, path: &str) -> String {
        format!("/resourceGroups/{}/providers/{path}", self.resource_group)
    }
}

fn generate_key() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

fn endpoint(resource: &ResourceRef) -> Option<String> {
    let name = &resource.name;
    match resource.kind {
        ResourceKind::SqlServer => Some(format!("{name}.database.windows.net")),
        ResourceKind::EventHubNamespace => Some(format!("sb://{name}.servicebus.windows.net/")),
        ResourceKind::StorageAccount => Some(format!("https://{name}.blob.core.windows.net/")),
        _ => None,
    }
}

fn not_found(resource: &ResourceRef) -> ProviderError {
    ProviderError::NotFound {
        kind: resource.kind,
        name: resource.name.clone(),
    }
}

#[async_trait]
impl CloudProvider for SimulatedProvider {
    async fn exists(&self, resource: &ResourceRef) -> Result<bool, ProviderError> {
        let _in_flight = self.enter().await?;
        Ok(self
            .state
            .lock()
            .await
            .resources
            .contains_key(&resource.path()))
    }

    async fn create(
        &self,
        resource: &ResourceRef,
        spec: ResourceSpec,
    ) -> Result<ResourceHandle, ProviderError> {
        let _in_flight = self.enter().await?;
        if spec.kind() != resource.kind {
            return Err(ProviderError::KindMismatch {
                kind: resource.kind,
                spec: spec.kind(),
            });
        }
        self.check_faults(resource)?;

        let mut state = self.state.lock().await;
        if let Some(parent) = &resource.parent {
            if !state.resources.contains_key(parent) {
                return Err(ProviderError::NotFound {
                    kind: resource.kind.parent().unwrap_or(resource.kind),
                    name: parent.clone(),
                });
            }
        }
        let path = resource.path();
        if state.resources.contains_key(&path) {
            return Err(ProviderError::Conflict {
                kind: resource.kind,
                name: resource.name.clone(),
            });
        }

        let handle = ResourceHandle {
            reference: resource.clone(),
            id: self.resource_id(&path),
            endpoint: endpoint(resource),
            state: ProvisioningState::Succeeded,
        };
        let access_key = match resource.kind {
            ResourceKind::AuthorizationRule => Some(AccessKey {
                key_name: resource.name.clone(),
                primary_key: generate_key(),
                secondary_key: generate_key(),
            }),
            ResourceKind::StorageAccount => Some(AccessKey {
                key_name: "key1".to_owned(),
                primary_key: generate_key(),
                secondary_key: generate_key(),
            }),
            _ => None,
        };
        state.resources.insert(
            path,
            StoredResource {
                handle: handle.clone(),
                spec: Some(spec),
                access_key,
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        self.persist(&state).await?;
        tracing::debug!(resource = %resource, "simulated create");
        Ok(handle)
    }

    async fn get(&self, resource: &ResourceRef) -> Result<ResourceHandle, ProviderError> {
        let _in_flight = self.enter().await?;
        self.state
            .lock()
            .await
            .resources
            .get(&resource.path())
            .map(|stored| stored.handle.clone())
            .ok_or_else(|| not_found(resource))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        let _in_flight = self.enter().await?;
        let path = handle.reference.path();
        let mut state = self.state.lock().await;
        if state.resources.remove(&path).is_none() {
            return Err(not_found(&handle.reference));
        }
        let prefix = format!("{path}/");
        state.resources.retain(|key, _| !key.starts_with(&prefix));
        self.persist(&state).await?;
        tracing::debug!(resource = %handle.reference, "simulated delete");
        Ok(())
    }

    async fn list_all(&self, kind: ResourceKind) -> Result<Vec<ResourceHandle>, ProviderError> {
        let _in_flight = self.enter().await?;
        Ok(self
            .state
            .lock()
            .await
            .resources
            .values()
            .filter(|stored| stored.handle.kind() == kind)
            .map(|stored| stored.handle.clone())
            .collect())
    }

    async fn fetch_access_key(&self, handle: &ResourceHandle) -> Result<AccessKey, ProviderError> {
        let _in_flight = self.enter().await?;
        let state = self.state.lock().await;
        let stored = state
            .resources
            .get(&handle.reference.path())
            .ok_or_else(|| not_found(&handle.reference))?;
        stored
            .access_key
            .clone()
            .ok_or_else(|| ProviderError::NoAccessKeys {
                kind: handle.kind(),
                name: handle.name().to_owned(),
            })
    }
}

#[async_trait]
impl BulkImport for SimulatedProvider {
    async fn start_import(
        &self,
        server: &ResourceHandle,
        request: ImportRequest,
    ) -> Result<ImportTicket, ProviderError> {
        let _in_flight = self.enter().await?;
        let database = server
            .reference
            .child(ResourceKind::SqlDatabase, request.database_name);
        self.check_faults(&database)?;

        let mut state = self.state.lock().await;
        if !state.resources.contains_key(&server.reference.path()) {
            return Err(not_found(&server.reference));
        }
        let path = database.path();
        if state.resources.contains_key(&path) {
            return Err(ProviderError::Conflict {
                kind: ResourceKind::SqlDatabase,
                name: database.name,
            });
        }
        state.next_operation += 1;
        let ticket = ImportTicket {
            operation_id: format!("import-{:06}", state.next_operation),
            database: database.clone(),
        };
        state.resources.insert(
            path.clone(),
            StoredResource {
                handle: ResourceHandle {
                    reference: database,
                    id: self.resource_id(&path),
                    endpoint: None,
                    state: ProvisioningState::Importing,
                },
                spec: None,
                access_key: None,
            },
        );
        state.imports.push(ticket.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        self.persist(&state).await?;
        tracing::debug!(
            operation = %ticket.operation_id,
            source = %request.source_uri,
            "simulated import accepted"
        );
        Ok(ticket)
    }
}
