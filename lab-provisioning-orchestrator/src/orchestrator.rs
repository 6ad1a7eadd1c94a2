use core::panic::AssertUnwindSafe;
use core::time::Duration;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt as _;
use lab_provisioning_config::{AttendeeRecord, Config};
use lab_provisioning_provider::{BulkImport, CloudProvider, ResourceHandle, ResourceKind};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::builder::AttendeeResourceBuilder;
use crate::error::ProvisioningError;
use crate::naming::NamingScheme;
use crate::progress::Progress;
use crate::report;
use crate::resources::ProvisionedAttendeeResources;
use crate::sas::Clock;

/// Asked once before anything is created or deleted.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// For non-interactive runs that were confirmed on the command line.
pub struct AssumeYes;

#[async_trait]
impl Confirmation for AssumeYes {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub attempted: usize,
    pub fully_provisioned: usize,
    pub elapsed: Duration,
    /// Sorted by attendee name, exactly as written to the report.
    pub rows: Vec<ProvisionedAttendeeResources>,
    pub cancelled: bool,
}

#[derive(Debug)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
}

pub struct Orchestrator {
    config: Arc<Config>,
    provider: Arc<dyn CloudProvider>,
    builder: Arc<AttendeeResourceBuilder>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn CloudProvider>,
        importer: Arc<dyn BulkImport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let builder = AttendeeResourceBuilder::new(
            Arc::clone(&config),
            Arc::clone(&provider),
            importer,
            clock,
        );
        Self {
            config,
            provider,
            builder: Arc::new(builder),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn naming(&self) -> &NamingScheme {
        self.builder.naming()
    }

    async fn confirm(
        confirmation: &dyn Confirmation,
        prompt: &str,
    ) -> Result<(), ProvisioningError> {
        if confirmation.confirm(prompt).await {
            Ok(())
        } else {
            info!("operator declined, nothing was changed");
            Err(ProvisioningError::ConfirmationDeclined)
        }
    }

    pub async fn create_all(
        &self,
        roster: &[AttendeeRecord],
        confirmation: &dyn Confirmation,
        cancel: &CancellationToken,
        console: &mut (dyn Write + Send),
    ) -> Result<RunSummary, ProvisioningError> {
        let prompt = format!(
            "Create lab resources for all {} attendees in resource group {}?",
            roster.len(),
            self.config.resource_group
        );
        Self::confirm(confirmation, &prompt).await?;
        self.run_create(roster, None, cancel, console).await
    }

    pub async fn create_one(
        &self,
        name: &str,
        roster: &[AttendeeRecord],
        confirmation: &dyn Confirmation,
        cancel: &CancellationToken,
        console: &mut (dyn Write + Send),
    ) -> Result<RunSummary, ProvisioningError> {
        if !roster.iter().any(|attendee| attendee.name == name) {
            return Err(ProvisioningError::UnknownAttendee(name.to_owned()));
        }
        let prompt = format!(
            "Create lab resources for {name} in resource group {}?",
            self.config.resource_group
        );
        Self::confirm(confirmation, &prompt).await?;
        self.run_create(roster, Some(name), cancel, console).await
    }

    /// Name clashes are resolved against the whole roster, even when only
    /// `only` is provisioned.
    async fn run_create(
        &self,
        roster: &[AttendeeRecord],
        only: Option<&str>,
        cancel: &CancellationToken,
        console: &mut (dyn Write + Send),
    ) -> Result<RunSummary, ProvisioningError> {
        let started = Instant::now();
        let collisions = self.builder.naming().collisions(roster);
        let attendees: Vec<AttendeeRecord> = roster
            .iter()
            .filter(|attendee| only.is_none_or(|name| attendee.name == name))
            .cloned()
            .collect();
        let progress = Arc::new(Progress::default());
        let results = Arc::new(Mutex::new(Vec::with_capacity(attendees.len())));
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallelism));

        info!(
            attendees = attendees.len(),
            max_parallelism = self.config.max_parallelism,
            "creating lab resources"
        );
        let mut tasks = JoinSet::new();
        for attendee in attendees {
            if let Some(earlier) = collisions.get(&attendee.name) {
                let error = format!("derived resource names clash with attendee {earlier}");
                progress.failed("creating", &attendee.name, "resources", &error);
                results.lock().await.push(ProvisionedAttendeeResources::failed(
                    &attendee.name,
                    "resources",
                    error,
                ));
                continue;
            }

            let builder = Arc::clone(&self.builder);
            let progress = Arc::clone(&progress);
            let results = Arc::clone(&results);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                // never started, so never attempted
                let Some(_permit) = permit else {
                    return;
                };
                let resources = AssertUnwindSafe(builder.provision(&attendee, &progress, &cancel))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        progress.failed("creating", &attendee.name, "resources", "task panicked");
                        ProvisionedAttendeeResources::failed(
                            &attendee.name,
                            "resources",
                            "task panicked",
                        )
                    });
                results.lock().await.push(resources);
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                error!(%error, "attendee task did not finish");
            }
        }

        let mut rows = core::mem::take(&mut *results.lock().await);
        report::write_report(&self.config.report_path, &mut rows, console)?;
        let summary = RunSummary {
            attempted: rows.len(),
            fully_provisioned: rows.iter().filter(|row| row.is_complete()).count(),
            elapsed: started.elapsed(),
            rows,
            cancelled: cancel.is_cancelled(),
        };
        info!(
            attempted = summary.attempted,
            fully_provisioned = summary.fully_provisioned,
            steps = progress.steps(),
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            cancelled = summary.cancelled,
            "create finished"
        );
        Ok(summary)
    }

    /// Removes every lab resource in the resource group, also those of
    /// attendees no longer on the roster.
    pub async fn delete_all(
        &self,
        confirmation: &dyn Confirmation,
        cancel: &CancellationToken,
    ) -> Result<DeleteSummary, ProvisioningError> {
        let prompt = format!(
            "Delete all lab resources in resource group {}?",
            self.config.resource_group
        );
        Self::confirm(confirmation, &prompt).await?;
        self.run_delete(None, &[], cancel).await
    }

    /// Also works for attendees no longer on `roster`. Names that an attendee
    /// earlier on `roster` derives as well belong to that attendee and are
    /// left alone.
    pub async fn delete_one(
        &self,
        name: &str,
        roster: &[AttendeeRecord],
        confirmation: &dyn Confirmation,
        cancel: &CancellationToken,
    ) -> Result<DeleteSummary, ProvisioningError> {
        let prompt = format!(
            "Delete the lab resources of {name} in resource group {}?",
            self.config.resource_group
        );
        Self::confirm(confirmation, &prompt).await?;
        self.run_delete(Some(name), roster, cancel).await
    }

    async fn delete_targets(
        &self,
        attendee: Option<&str>,
        roster: &[AttendeeRecord],
    ) -> Result<Vec<ResourceHandle>, ProvisioningError> {
        let naming = self.builder.naming();
        let mut targets = Vec::new();
        for kind in ResourceKind::TOP_LEVEL {
            let wanted = match attendee {
                Some(attendee) => {
                    if let Some(owner) = naming.prior_owner(kind, attendee, roster) {
                        warn!(
                            attendee,
                            owner,
                            %kind,
                            "resource name belongs to another attendee, not deleting it"
                        );
                        continue;
                    }
                    naming.derive(kind, attendee)
                }
                None => None,
            };
            let listed = self.provider.list_all(kind).await?;
            targets.extend(listed.into_iter().filter(|handle| match &wanted {
                Some(name) => name == handle.name(),
                None => attendee.is_none() && naming.belongs(kind, handle.name()),
            }));
        }
        Ok(targets)
    }

    async fn run_delete(
        &self,
        attendee: Option<&str>,
        roster: &[AttendeeRecord],
        cancel: &CancellationToken,
    ) -> Result<DeleteSummary, ProvisioningError> {
        let started = Instant::now();
        let targets = self.delete_targets(attendee, roster).await?;
        if targets.is_empty() {
            warn!(attendee, "no lab resources to delete");
        }
        let progress = Arc::new(Progress::default());
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallelism));

        let mut tasks = JoinSet::new();
        for handle in targets {
            let builder = Arc::clone(&self.builder);
            let progress = Arc::clone(&progress);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let _permit = permit?;
                Some(builder.teardown(&handle, &progress, &cancel).await.is_ok())
            });
        }

        let (mut deleted, mut failed) = (0, 0);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(true)) => deleted += 1,
                Ok(Some(false)) => failed += 1,
                Ok(None) => {}
                Err(error) => {
                    error!(%error, "delete task did not finish");
                    failed += 1;
                }
            }
        }
        let summary = DeleteSummary {
            deleted,
            failed,
            elapsed: started.elapsed(),
            cancelled: cancel.is_cancelled(),
        };
        info!(
            deleted,
            failed,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            cancelled = summary.cancelled,
            "delete finished"
        );
        Ok(summary)
    }

    /// Every resource of every kind in the resource group, ordered by path.
    pub async fn list_all(&self) -> Result<Vec<ResourceHandle>, ProvisioningError> {
        let mut handles = Vec::new();
        for kind in ResourceKind::ALL {
            handles.extend(self.provider.list_all(kind).await?);
        }
        handles.sort_by_cached_key(|handle| handle.reference.path());
        Ok(handles)
    }
}
