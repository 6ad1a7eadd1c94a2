use lab_provisioning_config::ConfigError;
use lab_provisioning_provider::{ProviderError, ResourceKind};

#[derive(thiserror::Error, Debug)]
pub enum ProvisioningError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("{kind} {name} does not exist")]
    ResourceNotFound { kind: ResourceKind, name: String },
    #[error("access key {0} is empty, refusing to sign with it")]
    InvalidKey(String),
    #[error("token expiry of {0} days is out of range")]
    ExpiryOutOfRange(u32),
    #[error("provider error: {0}")]
    Provider(#[source] ProviderError),
    #[error("the operator declined the confirmation")]
    ConfirmationDeclined,
    #[error("cancelled")]
    Cancelled,
    #[error("attendee {0} is not on the roster")]
    UnknownAttendee(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write report: {0}")]
    Report(#[from] csv::Error),
}

impl From<ProviderError> for ProvisioningError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::NotFound { kind, name } => Self::ResourceNotFound { kind, name },
            other => Self::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resources_keep_their_kind() {
        let error = ProvisioningError::from(ProviderError::NotFound {
            kind: ResourceKind::AuthorizationRule,
            name: "lab-access".to_owned(),
        });
        assert!(matches!(
            &error,
            ProvisioningError::ResourceNotFound {
                kind: ResourceKind::AuthorizationRule,
                name,
            } if name == "lab-access"
        ));
        assert!(matches!(
            ProvisioningError::from(ProviderError::RateLimited),
            ProvisioningError::Provider(ProviderError::RateLimited)
        ));
    }
}
