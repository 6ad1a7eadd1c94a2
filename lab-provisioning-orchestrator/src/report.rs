use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::ProvisioningError;
use crate::resources::ProvisionedAttendeeResources;

pub const HEADER: [&str; 11] = [
    "AttendeeName",
    "SqlServer",
    "SqlDatabase",
    "EventHubNamespace",
    "EventHub",
    "ConsumerGroup",
    "EventHubConnectionString",
    "SasToken",
    "StorageAccount",
    "StorageConnectionString",
    "Failures",
];

fn field(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

fn record(resources: &ProvisionedAttendeeResources) -> [String; 11] {
    [
        resources.attendee_name.clone(),
        field(resources.sql.server.as_ref()),
        field(resources.sql.database.as_ref()),
        field(resources.messaging.namespace.as_ref()),
        field(resources.messaging.hub.as_ref()),
        field(resources.messaging.consumer_group.as_ref()),
        field(resources.messaging.connection_string.as_ref()),
        field(resources.messaging.sas_token.as_ref()),
        field(resources.storage.account.as_ref()),
        field(resources.storage.connection_string.as_ref()),
        resources
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";"),
    ]
}

pub fn sort_rows(rows: &mut [ProvisionedAttendeeResources]) {
    rows.sort_by(|a, b| a.attendee_name.cmp(&b.attendee_name));
}

/// Overwrites `path`. Rows with failures are kept, their missing fields stay
/// empty.
pub fn write_report(
    path: &Path,
    rows: &mut [ProvisionedAttendeeResources],
    console: &mut (dyn Write + Send),
) -> Result<(), ProvisioningError> {
    sort_rows(rows);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;
    writeln!(console, "{}", HEADER.join(","))?;
    for (index, resources) in rows.iter().enumerate() {
        let record = record(resources);
        writer.write_record(&record)?;
        writeln!(console, "{:>3}. {}", index + 1, record.join(","))?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "report written");
    Ok(())
}
