use core::fmt::{self, Display};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    SqlServer,
    FirewallRule,
    SqlDatabase,
    EventHubNamespace,
    EventHub,
    ConsumerGroup,
    AuthorizationRule,
    StorageAccount,
    BlobContainer,
}

impl ResourceKind {
    /// Kinds that live directly in the resource group. Everything else is
    /// nested below one of these and goes away with it.
    pub const TOP_LEVEL: [Self; 3] = [Self::SqlServer, Self::EventHubNamespace, Self::StorageAccount];

    pub const ALL: [Self; 9] = [
        Self::SqlServer,
        Self::FirewallRule,
        Self::SqlDatabase,
        Self::EventHubNamespace,
        Self::EventHub,
        Self::ConsumerGroup,
        Self::AuthorizationRule,
        Self::StorageAccount,
        Self::BlobContainer,
    ];

    /// Path segment, modelled after the resource id layout of the big clouds.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::SqlServer => "servers",
            Self::FirewallRule => "firewallRules",
            Self::SqlDatabase => "databases",
            Self::EventHubNamespace => "namespaces",
            Self::EventHub => "eventhubs",
            Self::ConsumerGroup => "consumergroups",
            Self::AuthorizationRule => "authorizationRules",
            Self::StorageAccount => "storageAccounts",
            Self::BlobContainer => "containers",
        }
    }

    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::SqlServer | Self::EventHubNamespace | Self::StorageAccount => None,
            Self::FirewallRule | Self::SqlDatabase => Some(Self::SqlServer),
            Self::EventHub => Some(Self::EventHubNamespace),
            Self::ConsumerGroup | Self::AuthorizationRule => Some(Self::EventHub),
            Self::BlobContainer => Some(Self::StorageAccount),
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SqlServer => "sql server",
            Self::FirewallRule => "firewall rule",
            Self::SqlDatabase => "sql database",
            Self::EventHubNamespace => "event hubs namespace",
            Self::EventHub => "event hub",
            Self::ConsumerGroup => "consumer group",
            Self::AuthorizationRule => "authorization rule",
            Self::StorageAccount => "storage account",
            Self::BlobContainer => "blob container",
        })
    }
}

/// Addresses a resource by kind, name and (for sub-resources) the path of
/// its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub parent: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn top_level(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            parent: None,
            name: name.into(),
        }
    }

    pub fn child(&self, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            parent: Some(self.path()),
            name: name.into(),
        }
    }

    /// e.g. `namespaces/ehws-alice/eventhubs/changes`
    #[must_use]
    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}/{}/{}", self.kind.segment(), self.name),
            None => format!("{}/{}", self.kind.segment(), self.name),
        }
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessRight {
    Manage,
    Listen,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTier {
    Hot,
    Cool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    Tls1_2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicAccess {
    None,
    Blob,
    Container,
}

/// What to create. Each variant creates exactly one [`ResourceKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceSpec {
    SqlServer {
        region: String,
        administrator_login: String,
        administrator_password: String,
        minimal_tls_version: TlsVersion,
    },
    FirewallRule {
        start_ip: Ipv4Addr,
        end_ip: Ipv4Addr,
    },
    EventHubNamespace {
        region: String,
        sku: String,
        capacity: u32,
    },
    EventHub {
        partition_count: u32,
        message_retention_days: u32,
    },
    ConsumerGroup,
    AuthorizationRule {
        rights: Vec<AccessRight>,
    },
    StorageAccount {
        region: String,
        sku: String,
        access_tier: AccessTier,
        minimal_tls_version: TlsVersion,
        allow_blob_public_access: bool,
    },
    BlobContainer {
        public_access: PublicAccess,
    },
}

impl ResourceSpec {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::SqlServer { .. } => ResourceKind::SqlServer,
            Self::FirewallRule { .. } => ResourceKind::FirewallRule,
            Self::EventHubNamespace { .. } => ResourceKind::EventHubNamespace,
            Self::EventHub { .. } => ResourceKind::EventHub,
            Self::ConsumerGroup => ResourceKind::ConsumerGroup,
            Self::AuthorizationRule { .. } => ResourceKind::AuthorizationRule,
            Self::StorageAccount { .. } => ResourceKind::StorageAccount,
            Self::BlobContainer { .. } => ResourceKind::BlobContainer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Succeeded,
    Importing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub reference: ResourceRef,
    /// Provider-wide identifier.
    pub id: String,
    /// Public host or URL, for kinds that have one.
    pub endpoint: Option<String>,
    pub state: ProvisioningState,
}

impl ResourceHandle {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        self.reference.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.reference.name
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey {
    pub key_name: String,
    pub primary_key: String,
    pub secondary_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ImportRequest {
    pub database_name: String,
    pub source_uri: String,
    pub storage_key: String,
    pub administrator_login: String,
    pub administrator_password: String,
    pub edition: String,
    pub service_objective: String,
}

/// Proof that the provider accepted an import. Completion is not tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTicket {
    pub operation_id: String,
    pub database: ResourceRef,
}
