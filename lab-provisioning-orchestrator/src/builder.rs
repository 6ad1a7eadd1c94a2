use core::fmt::Display;
use std::net::Ipv4Addr;
use std::sync::Arc;

use lab_provisioning_config::{AttendeeRecord, Config};
use lab_provisioning_provider::{
    AccessRight, AccessTier, BulkImport, CloudProvider, ImportRequest, PublicAccess,
    ResourceHandle, ResourceKind, ResourceRef, ResourceSpec, TlsVersion,
};
use tokio_util::sync::CancellationToken;

use crate::error::ProvisioningError;
use crate::naming::NamingScheme;
use crate::probe::ExistenceProber;
use crate::progress::Progress;
use crate::resources::{
    MessagingResources, ProvisionedAttendeeResources, ResourceFailure, SqlResources,
    StorageResources,
};
use crate::sas::{self, Clock};

const SERVICE_BUS_SUFFIX: &str = "servicebus.windows.net";
const STORAGE_ENDPOINT_SUFFIX: &str = "core.windows.net";

struct StepContext<'a> {
    attendee: &'a str,
    progress: &'a Progress,
    cancel: &'a CancellationToken,
}

impl StepContext<'_> {
    fn check_cancelled(&self) -> Result<(), ProvisioningError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisioningError::Cancelled);
        }
        Ok(())
    }

    fn fail(&self, what: impl Display, error: &ProvisioningError) -> ResourceFailure {
        self.progress.failed("creating", self.attendee, &what, error);
        ResourceFailure {
            what: what.to_string(),
            message: error.to_string(),
        }
    }
}

/// Creates (or finds) the complete lab environment of a single attendee.
pub struct AttendeeResourceBuilder {
    provider: Arc<dyn CloudProvider>,
    importer: Arc<dyn BulkImport>,
    prober: ExistenceProber,
    config: Arc<Config>,
    naming: NamingScheme,
    clock: Arc<dyn Clock>,
}

impl AttendeeResourceBuilder {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn CloudProvider>,
        importer: Arc<dyn BulkImport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prober: ExistenceProber::new(Arc::clone(&provider)),
            naming: NamingScheme::from_config(&config),
            provider,
            importer,
            config,
            clock,
        }
    }

    pub const fn naming(&self) -> &NamingScheme {
        &self.naming
    }

    /// Never fails as a whole. Database, messaging and storage are set up
    /// concurrently and each records its own failure.
    pub async fn provision(
        &self,
        attendee: &AttendeeRecord,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> ProvisionedAttendeeResources {
        let ctx = StepContext {
            attendee: &attendee.name,
            progress,
            cancel,
        };
        let mut resources = ProvisionedAttendeeResources::new(&attendee.name);
        let (sql, messaging, storage) = tokio::join!(
            self.provision_sql(&ctx, &mut resources.sql),
            self.provision_messaging(&ctx, &mut resources.messaging),
            self.provision_storage(&ctx, &mut resources.storage),
        );
        resources
            .failures
            .extend([sql, messaging, storage].into_iter().filter_map(Result::err));
        resources
    }

    async fn ensure_exists(
        &self,
        ctx: &StepContext<'_>,
        resource: &ResourceRef,
        spec: impl FnOnce() -> ResourceSpec + Send,
    ) -> Result<ResourceHandle, ResourceFailure> {
        let result: Result<ResourceHandle, ProvisioningError> = async {
            ctx.check_cancelled()?;
            if self.prober.exists(resource).await? {
                let handle = self.provider.get(resource).await?;
                ctx.progress.skipped(ctx.attendee, resource);
                return Ok(handle);
            }
            ctx.check_cancelled()?;
            let handle = self.provider.create(resource, spec()).await?;
            ctx.progress.created(ctx.attendee, resource);
            Ok(handle)
        }
        .await;
        result.map_err(|error| ctx.fail(resource, &error))
    }

    async fn provision_sql(
        &self,
        ctx: &StepContext<'_>,
        out: &mut SqlResources,
    ) -> Result<(), ResourceFailure> {
        let sql = &self.config.sql;
        let server_ref = ResourceRef::top_level(
            ResourceKind::SqlServer,
            self.naming.sql_server(ctx.attendee),
        );
        let server = self
            .ensure_exists(ctx, &server_ref, || ResourceSpec::SqlServer {
                region: self.config.region.clone(),
                administrator_login: sql.administrator_login.clone(),
                administrator_password: sql.administrator_password.clone(),
                minimal_tls_version: TlsVersion::Tls1_2,
            })
            .await?;
        out.server = Some(
            server
                .endpoint
                .clone()
                .unwrap_or_else(|| server_ref.name.clone()),
        );

        // lab machines connect from anywhere
        let firewall_ref = server_ref.child(ResourceKind::FirewallRule, &sql.firewall_rule_name);
        self.ensure_exists(ctx, &firewall_ref, || ResourceSpec::FirewallRule {
            start_ip: Ipv4Addr::UNSPECIFIED,
            end_ip: Ipv4Addr::BROADCAST,
        })
        .await?;

        let database_ref = server_ref.child(ResourceKind::SqlDatabase, &sql.database_name);
        self.start_import(ctx, &server, &database_ref).await?;
        out.database = Some(sql.database_name.clone());
        Ok(())
    }

    /// Only waits until the provider accepted the import.
    async fn start_import(
        &self,
        ctx: &StepContext<'_>,
        server: &ResourceHandle,
        database_ref: &ResourceRef,
    ) -> Result<(), ResourceFailure> {
        let sql = &self.config.sql;
        let result: Result<(), ProvisioningError> = async {
            ctx.check_cancelled()?;
            if self.prober.exists(database_ref).await? {
                ctx.progress.skipped(ctx.attendee, database_ref);
                return Ok(());
            }
            let ticket = self
                .importer
                .start_import(
                    server,
                    ImportRequest {
                        database_name: sql.database_name.clone(),
                        source_uri: sql.import.source_uri.clone(),
                        storage_key: sql.import.storage_key.clone(),
                        administrator_login: sql.administrator_login.clone(),
                        administrator_password: sql.administrator_password.clone(),
                        edition: sql.import.edition.clone(),
                        service_objective: sql.import.service_objective.clone(),
                    },
                )
                .await?;
            ctx.progress
                .import_started(ctx.attendee, database_ref, &ticket.operation_id);
            Ok(())
        }
        .await;
        result.map_err(|error| ctx.fail(database_ref, &error))
    }

    async fn provision_messaging(
        &self,
        ctx: &StepContext<'_>,
        out: &mut MessagingResources,
    ) -> Result<(), ResourceFailure> {
        let event_hubs = &self.config.event_hubs;
        let namespace_ref = ResourceRef::top_level(
            ResourceKind::EventHubNamespace,
            self.naming.event_hubs_namespace(ctx.attendee),
        );
        self.ensure_exists(ctx, &namespace_ref, || ResourceSpec::EventHubNamespace {
            region: self.config.region.clone(),
            sku: event_hubs.sku.clone(),
            capacity: event_hubs.capacity,
        })
        .await?;
        out.namespace = Some(namespace_ref.name.clone());

        let hub_ref = namespace_ref.child(ResourceKind::EventHub, &event_hubs.hub_name);
        self.ensure_exists(ctx, &hub_ref, || ResourceSpec::EventHub {
            partition_count: event_hubs.partition_count,
            message_retention_days: event_hubs.message_retention_days,
        })
        .await?;
        out.hub = Some(event_hubs.hub_name.clone());

        if let Some(group) = &event_hubs.consumer_group {
            let group_ref = hub_ref.child(ResourceKind::ConsumerGroup, group);
            self.ensure_exists(ctx, &group_ref, || ResourceSpec::ConsumerGroup)
                .await?;
            out.consumer_group = Some(group.clone());
        }

        let rule_ref = hub_ref.child(ResourceKind::AuthorizationRule, &event_hubs.policy_name);
        let rule = self
            .ensure_exists(ctx, &rule_ref, || ResourceSpec::AuthorizationRule {
                rights: vec![AccessRight::Manage, AccessRight::Listen, AccessRight::Send],
            })
            .await?;

        let host = format!("{}.{SERVICE_BUS_SUFFIX}", namespace_ref.name);
        let result: Result<(String, sas::AccessToken), ProvisioningError> = async {
            ctx.check_cancelled()?;
            let key = self.provider.fetch_access_key(&rule).await?;
            let token = sas::generate(
                &format!("https://{host}/{}", event_hubs.hub_name),
                &key.key_name,
                &key.primary_key,
                self.config.token_expiry_days,
                self.clock.now(),
            )?;
            let connection_string = format!(
                "Endpoint=sb://{host}/;SharedAccessKeyName={};SharedAccessKey={};EntityPath={}",
                key.key_name, key.primary_key, event_hubs.hub_name
            );
            Ok((connection_string, token))
        }
        .await;
        let (connection_string, token) =
            result.map_err(|error| ctx.fail(format!("access token for {hub_ref}"), &error))?;
        out.connection_string = Some(connection_string);
        out.sas_token = Some(token.token);
        Ok(())
    }

    async fn provision_storage(
        &self,
        ctx: &StepContext<'_>,
        out: &mut StorageResources,
    ) -> Result<(), ResourceFailure> {
        let storage = &self.config.storage;
        let account_ref = ResourceRef::top_level(
            ResourceKind::StorageAccount,
            self.naming.storage_account(ctx.attendee),
        );
        let account = self
            .ensure_exists(ctx, &account_ref, || ResourceSpec::StorageAccount {
                region: self.config.region.clone(),
                sku: storage.sku.clone(),
                access_tier: AccessTier::Hot,
                minimal_tls_version: TlsVersion::Tls1_2,
                allow_blob_public_access: false,
            })
            .await?;
        out.account = Some(account_ref.name.clone());

        let container_ref = account_ref.child(ResourceKind::BlobContainer, &storage.container_name);
        self.ensure_exists(ctx, &container_ref, || ResourceSpec::BlobContainer {
            public_access: PublicAccess::None,
        })
        .await?;
        out.container = Some(storage.container_name.clone());

        let result: Result<String, ProvisioningError> = async {
            ctx.check_cancelled()?;
            let key = self.provider.fetch_access_key(&account).await?;
            if key.primary_key.is_empty() {
                return Err(ProvisioningError::InvalidKey(key.key_name));
            }
            Ok(format!(
                "DefaultEndpointsProtocol=https;AccountName={};AccountKey={};EndpointSuffix={STORAGE_ENDPOINT_SUFFIX}",
                account_ref.name, key.primary_key
            ))
        }
        .await;
        out.connection_string = Some(
            result.map_err(|error| ctx.fail(format!("access key of {account_ref}"), &error))?,
        );
        Ok(())
    }

    /// Deletes one top level resource, and with it everything below it.
    pub async fn teardown(
        &self,
        handle: &ResourceHandle,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<(), ResourceFailure> {
        let attendee = self
            .naming
            .attendee_of(handle.kind(), handle.name())
            .unwrap_or(handle.name());
        let result = if cancel.is_cancelled() {
            Err(ProvisioningError::Cancelled)
        } else {
            self.provider.delete(handle).await.map_err(Into::into)
        };
        match result {
            Ok(()) => {
                progress.deleted(attendee, &handle.reference);
                Ok(())
            }
            Err(error) => {
                progress.failed("deleting", attendee, &handle.reference, &error);
                Err(ResourceFailure {
                    what: handle.reference.to_string(),
                    message: error.to_string(),
                })
            }
        }
    }
}
