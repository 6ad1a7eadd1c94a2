//! Creates, lists and deletes the cloud lab environments of a workshop's
//! attendees, many at a time.

pub mod builder;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod report;
pub mod resources;
pub mod sas;

pub use builder::AttendeeResourceBuilder;
pub use error::ProvisioningError;
pub use naming::{derive_name, NamingRule, NamingScheme};
pub use orchestrator::{AssumeYes, Confirmation, DeleteSummary, Orchestrator, RunSummary};
pub use resources::{ProvisionedAttendeeResources, ResourceFailure};
pub use sas::{AccessToken, Clock, FixedClock, SystemClock};
