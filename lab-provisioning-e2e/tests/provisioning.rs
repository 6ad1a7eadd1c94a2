use core::time::Duration;

use async_trait::async_trait;
use lab_provisioning_e2e::Workshop;
use lab_provisioning_orchestrator::{AssumeYes, Confirmation, ProvisioningError};
use lab_provisioning_provider::{
    CloudProvider, ResourceKind, ResourceRef, ResourceSpec, SimulatedProvider, TlsVersion,
};
use tokio_util::sync::CancellationToken;

struct Decline;

#[async_trait]
impl Confirmation for Decline {
    async fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

fn names(workshop: &Workshop) -> Vec<String> {
    workshop
        .report_rows()
        .unwrap()
        .iter()
        .map(|row| row[0].to_owned())
        .collect()
}

#[tokio::test]
async fn second_run_creates_nothing() {
    let workshop = Workshop::new("alice\nbob\n").unwrap();
    let cancel = CancellationToken::new();

    let first = workshop
        .orchestrator
        .create_all(&workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();
    assert_eq!(first.attempted, 2);
    assert_eq!(first.fully_provisioned, 2);
    let created = workshop.provider.created();
    let report = workshop.report().unwrap();

    let second = workshop
        .orchestrator
        .create_all(&workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();
    assert_eq!(workshop.provider.created(), created);
    assert_eq!(workshop.provider.imports().await.len(), 2);
    assert_eq!(second.rows, first.rows);
    assert_eq!(workshop.report().unwrap(), report);
}

#[tokio::test]
async fn failing_attendee_does_not_affect_the_others() {
    let provider =
        SimulatedProvider::new("rg-workshop").fail_creating(ResourceKind::SqlServer, "xavier");
    let workshop = Workshop::with_provider("xavier\nyvonne\nzoe\n", provider, 3).unwrap();

    let summary = workshop
        .orchestrator
        .create_all(
            &workshop.roster,
            &AssumeYes,
            &CancellationToken::new(),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.fully_provisioned, 2);

    let rows = workshop.report_rows().unwrap();
    assert_eq!(names(&workshop), ["xavier", "yvonne", "zoe"]);
    let xavier = &rows[0];
    assert_eq!(&xavier[1], "");
    assert_eq!(&xavier[2], "");
    assert_eq!(&xavier[3], "ehws-xavier");
    assert_eq!(&xavier[8], "stwsxavier");
    assert!(xavier[10].starts_with("sql server sqlws-xavier: "));
    for row in &rows[1..] {
        assert_eq!(&row[10], "");
        assert!(row.iter().take(10).all(|field| !field.is_empty()));
    }
}

#[tokio::test]
async fn declined_confirmation_changes_nothing() {
    let workshop = Workshop::new("alice\n").unwrap();
    std::fs::write(workshop.report_path(), "previous report\n").unwrap();
    let cancel = CancellationToken::new();

    let error = workshop
        .orchestrator
        .create_all(&workshop.roster, &Decline, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap_err();
    assert!(matches!(error, ProvisioningError::ConfirmationDeclined));

    let error = workshop
        .orchestrator
        .delete_all(&Decline, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(error, ProvisioningError::ConfirmationDeclined));

    let error = workshop
        .orchestrator
        .delete_one("alice", &workshop.roster, &Decline, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(error, ProvisioningError::ConfirmationDeclined));

    assert_eq!(workshop.provider.calls(), 0);
    assert_eq!(workshop.report().unwrap(), "previous report\n");
}

#[tokio::test]
async fn report_is_sorted_by_attendee() {
    let workshop = Workshop::new("bob\nalice\ncarol\n").unwrap();
    let mut console: Vec<u8> = Vec::new();
    let summary = workshop
        .orchestrator
        .create_all(
            &workshop.roster,
            &AssumeYes,
            &CancellationToken::new(),
            &mut console,
        )
        .await
        .unwrap();

    assert_eq!(names(&workshop), ["alice", "bob", "carol"]);
    let rows: Vec<_> = summary
        .rows
        .iter()
        .map(|row| row.attendee_name.as_str())
        .collect();
    assert_eq!(rows, ["alice", "bob", "carol"]);
    let console = String::from_utf8(console).unwrap();
    assert!(console.starts_with("AttendeeName,SqlServer,"));
    assert!(console.contains("  2. bob,"));
}

#[tokio::test]
async fn delete_follows_the_provider_not_the_roster() {
    let workshop = Workshop::new("alice\nbob\n").unwrap();
    let cancel = CancellationToken::new();
    workshop
        .orchestrator
        .create_all(&workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();
    // not created by the lab tooling
    let unrelated = ResourceRef::top_level(ResourceKind::SqlServer, "prod-db");
    workshop
        .provider
        .create(
            &unrelated,
            ResourceSpec::SqlServer {
                region: "westeurope".to_owned(),
                administrator_login: "ops".to_owned(),
                administrator_password: "ops".to_owned(),
                minimal_tls_version: TlsVersion::Tls1_2,
            },
        )
        .await
        .unwrap();

    let summary = workshop
        .orchestrator
        .delete_one("bob", &workshop.roster, &AssumeYes, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 3);
    assert_eq!(summary.failed, 0);
    let remaining = workshop.orchestrator.list_all().await.unwrap();
    assert!(remaining.iter().all(|handle| !handle.reference.path().contains("bob")));
    assert!(remaining.iter().any(|handle| handle.name() == "sqlws-alice"));

    // alice is no longer on any roster, her resources still go
    let summary = workshop
        .orchestrator
        .delete_all(&AssumeYes, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 3);
    let remaining = workshop.orchestrator.list_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].reference, unrelated);
}

#[tokio::test]
async fn list_shows_sub_resources_in_path_order() {
    let workshop = Workshop::new("alice\n").unwrap();
    workshop
        .orchestrator
        .create_all(
            &workshop.roster,
            &AssumeYes,
            &CancellationToken::new(),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();

    let paths: Vec<_> = workshop
        .orchestrator
        .list_all()
        .await
        .unwrap()
        .iter()
        .map(|handle| handle.reference.path())
        .collect();
    assert_eq!(paths.len(), 9);
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert!(paths.contains(&"namespaces/ehws-alice/eventhubs/changes/consumergroups/lab".to_owned()));
    assert!(paths.contains(&"servers/sqlws-alice/databases/labdb".to_owned()));
}

#[tokio::test]
async fn cancelled_run_still_writes_a_report() {
    let workshop = Workshop::new("alice\nbob\n").unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = workshop
        .orchestrator
        .create_all(&workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.attempted, 0);
    assert_eq!(workshop.provider.calls(), 0);
    assert_eq!(workshop.report().unwrap().lines().count(), 1);
}

#[tokio::test]
async fn throttled_run_still_reports_everyone() {
    let provider = SimulatedProvider::new("rg-workshop")
        .with_latency(Duration::from_millis(5))
        .with_max_in_flight(1);
    let workshop = Workshop::with_provider("a1\na2\na3\na4\n", provider, 4).unwrap();

    let summary = workshop
        .orchestrator
        .create_all(
            &workshop.roster,
            &AssumeYes,
            &CancellationToken::new(),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();
    assert_eq!(summary.attempted, 4);
    assert!(summary.fully_provisioned < 4);
    assert_eq!(names(&workshop), ["a1", "a2", "a3", "a4"]);
    assert!(workshop.report().unwrap().contains("HTTP 429"));
}

#[tokio::test]
async fn one_attendee_at_a_time_stays_below_the_limit() {
    // each attendee has three branches in flight at most
    let provider = SimulatedProvider::new("rg-workshop")
        .with_latency(Duration::from_millis(1))
        .with_max_in_flight(3);
    let workshop = Workshop::with_provider("a1\na2\na3\n", provider, 1).unwrap();

    let summary = workshop
        .orchestrator
        .create_all(
            &workshop.roster,
            &AssumeYes,
            &CancellationToken::new(),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();
    assert_eq!(summary.fully_provisioned, 3);
}

#[tokio::test]
async fn single_attendee_must_be_on_the_roster() {
    let workshop = Workshop::new("alice\nbob\n").unwrap();
    let cancel = CancellationToken::new();

    let error = workshop
        .orchestrator
        .create_one(
            "mallory",
            &workshop.roster,
            &AssumeYes,
            &cancel,
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, ProvisioningError::UnknownAttendee(name) if name == "mallory"));
    assert_eq!(workshop.provider.calls(), 0);

    let summary = workshop
        .orchestrator
        .create_one("bob", &workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(names(&workshop), ["bob"]);
}

#[tokio::test]
async fn clashing_names_are_reported_not_created() {
    // both end up as stwsannmarie
    let workshop = Workshop::new("ann-marie\nann.marie\n").unwrap();
    let summary = workshop
        .orchestrator
        .create_all(
            &workshop.roster,
            &AssumeYes,
            &CancellationToken::new(),
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.fully_provisioned, 1);
    let clash = summary
        .rows
        .iter()
        .find(|row| row.attendee_name == "ann.marie")
        .unwrap();
    assert!(clash.failures[0].message.contains("ann-marie"));
}

#[tokio::test]
async fn single_attendee_run_respects_clashes_with_the_roster() {
    let workshop = Workshop::new("ann-marie\nann.marie\n").unwrap();
    let cancel = CancellationToken::new();
    let first = workshop
        .orchestrator
        .create_all(&workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();
    let created = workshop.provider.created();

    let summary = workshop
        .orchestrator
        .create_one(
            "ann.marie",
            &workshop.roster,
            &AssumeYes,
            &cancel,
            &mut Vec::<u8>::new(),
        )
        .await
        .unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.fully_provisioned, 0);
    let row = &summary.rows[0];
    assert_eq!(row.attendee_name, "ann.marie");
    assert!(row.storage.account.is_none());
    assert!(row.storage.connection_string.is_none());
    assert!(row.failures[0].message.contains("ann-marie"));
    assert_eq!(workshop.provider.created(), created);

    let owner = first
        .rows
        .iter()
        .find(|row| row.attendee_name == "ann-marie")
        .unwrap();
    assert_eq!(owner.storage.account.as_deref(), Some("stwsannmarie"));
}

#[tokio::test]
async fn deleting_one_attendee_spares_clashing_names() {
    let workshop = Workshop::new("ann-marie\nann.marie\n").unwrap();
    let cancel = CancellationToken::new();
    workshop
        .orchestrator
        .create_all(&workshop.roster, &AssumeYes, &cancel, &mut Vec::<u8>::new())
        .await
        .unwrap();

    let summary = workshop
        .orchestrator
        .delete_one("ann.marie", &workshop.roster, &AssumeYes, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 0);
    let accounts = workshop
        .provider
        .list_all(ResourceKind::StorageAccount)
        .await
        .unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name(), "stwsannmarie");

    // the owner still gets rid of it
    let summary = workshop
        .orchestrator
        .delete_one("ann-marie", &workshop.roster, &AssumeYes, &cancel)
        .await
        .unwrap();
    assert_eq!(summary.deleted, 3);
    assert!(workshop.orchestrator.list_all().await.unwrap().is_empty());
}
