use core::fmt::{self, Display};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlResources {
    /// Fully qualified host name.
    pub server: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagingResources {
    pub namespace: Option<String>,
    pub hub: Option<String>,
    pub consumer_group: Option<String>,
    pub connection_string: Option<String>,
    pub sas_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageResources {
    pub account: Option<String>,
    pub container: Option<String>,
    pub connection_string: Option<String>,
}

/// A step that did not complete, kept for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    pub what: String,
    pub message: String,
}

impl Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.what, self.message)
    }
}

/// Everything one run found or created for one attendee. Fields stay `None`
/// when their step failed or never ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionedAttendeeResources {
    pub attendee_name: String,
    pub sql: SqlResources,
    pub messaging: MessagingResources,
    pub storage: StorageResources,
    pub failures: Vec<ResourceFailure>,
}

impl ProvisionedAttendeeResources {
    pub fn new(attendee_name: impl Into<String>) -> Self {
        Self {
            attendee_name: attendee_name.into(),
            ..Self::default()
        }
    }

    pub fn failed(attendee_name: impl Into<String>, what: &str, message: impl Display) -> Self {
        let mut resources = Self::new(attendee_name);
        resources.failures.push(ResourceFailure {
            what: what.to_owned(),
            message: message.to_string(),
        });
        resources
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
