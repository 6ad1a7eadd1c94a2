use core::fmt::{Debug, Display};

use lab_provisioning_config::ConfigError;
use lab_provisioning_orchestrator::ProvisioningError;
use lab_provisioning_provider::ProviderError;

#[derive(thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),
    #[error("failed to open the provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("console error: {0}")]
    Io(#[from] std::io::Error),
}

impl Debug for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
