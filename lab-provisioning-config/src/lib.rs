use core::fmt::{Debug, Display};
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json};
use figment::Figment;
use serde::Deserialize;

pub mod roster;

pub use roster::{load_roster, parse_roster, AttendeeRecord};

#[derive(Deserialize, Clone)]
pub struct ImportConfig {
    /// Blob holding the reference dataset (a `.bacpac`).
    pub source_uri: String,
    pub storage_key: String,
    #[serde(default = "default_edition")]
    pub edition: String,
    #[serde(default = "default_service_objective")]
    pub service_objective: String,
}

#[derive(Deserialize, Clone)]
pub struct SqlConfig {
    pub server_base_name: String,
    pub administrator_login: String,
    pub administrator_password: String,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default = "default_firewall_rule_name")]
    pub firewall_rule_name: String,
    pub import: ImportConfig,
}

#[derive(Deserialize, Clone)]
pub struct EventHubsConfig {
    pub namespace_base_name: String,
    pub hub_name: String,
    pub consumer_group: Option<String>,
    #[serde(default = "default_policy_name")]
    pub policy_name: String,
    #[serde(default = "default_event_hubs_sku")]
    pub sku: String,
    #[serde(default = "one")]
    pub capacity: u32,
    #[serde(default = "one")]
    pub partition_count: u32,
    #[serde(default = "one")]
    pub message_retention_days: u32,
}

#[derive(Deserialize, Clone)]
pub struct StorageConfig {
    pub account_base_name: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default = "default_storage_sku")]
    pub sku: String,
}

/// Settings of the local simulated provider.
#[derive(Deserialize, Clone, Default)]
pub struct ProviderConfig {
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub latency_ms: u64,
    /// Requests above this many in flight fail like an HTTP 429 would.
    pub max_concurrent_requests: Option<usize>,
}

#[derive(Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
}

#[derive(Deserialize, Clone)]
pub struct Config {
    pub resource_group: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub token_expiry_days: u32,
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
    pub sql: SqlConfig,
    pub event_hubs: EventHubsConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_edition() -> String {
    "Standard".to_owned()
}

fn default_service_objective() -> String {
    "S0".to_owned()
}

fn default_database_name() -> String {
    "AdventureWorksLT".to_owned()
}

fn default_firewall_rule_name() -> String {
    "AllowAll".to_owned()
}

fn default_policy_name() -> String {
    "lab-access".to_owned()
}

fn default_event_hubs_sku() -> String {
    "Standard".to_owned()
}

const fn one() -> u32 {
    1
}

fn default_container_name() -> String {
    "lab-data".to_owned()
}

fn default_storage_sku() -> String {
    "Standard_LRS".to_owned()
}

fn default_region() -> String {
    "westeurope".to_owned()
}

const fn default_max_parallelism() -> usize {
    4
}

fn default_report_path() -> PathBuf {
    PathBuf::from("attendee-resources.csv")
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("settings file {} not found", .0.display())]
    SettingsNotFound(PathBuf),
    #[error("config error: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("roster file {} not found", .0.display())]
    RosterNotFound(PathBuf),
    #[error("failed to read roster {}: {source}", path.display())]
    RosterRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("roster line {line}: {reason}")]
    RosterLine { line: usize, reason: String },
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Extract(Box::new(value))
    }
}

/// Reads the JSON settings file and applies `LAB_` environment overrides,
/// e.g. `LAB_EVENT_HUBS__HUB_NAME`.
pub fn get_config(settings_path: &Path) -> Result<Config, ConfigError> {
    if !settings_path.is_file() {
        return Err(ConfigError::SettingsNotFound(settings_path.to_owned()));
    }
    let config: Config = Figment::new()
        .merge(Json::file(settings_path))
        .merge(Env::prefixed("LAB_").split("__"))
        .extract()?;
    config.validate()?;
    tracing::debug!(path = %settings_path.display(), "loaded settings");
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_expiry_days == 0 {
            return Err(ConfigError::Invalid {
                key: "token_expiry_days",
                reason: "must be a positive number of days".to_owned(),
            });
        }
        if self.max_parallelism == 0 {
            return Err(ConfigError::Invalid {
                key: "max_parallelism",
                reason: "must be at least 1".to_owned(),
            });
        }
        for (key, value) in [
            ("resource_group", &self.resource_group),
            ("sql.server_base_name", &self.sql.server_base_name),
            ("event_hubs.namespace_base_name", &self.event_hubs.namespace_base_name),
            ("event_hubs.hub_name", &self.event_hubs.hub_name),
            ("storage.account_base_name", &self.storage.account_base_name),
            ("storage.container_name", &self.storage.container_name),
        ] {
            if !value.chars().any(char::is_alphanumeric) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must contain at least one alphanumeric character".to_owned(),
                });
            }
        }
        Ok(())
    }
}

fn masked(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "********"
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "resource group:       {}", self.resource_group)?;
        writeln!(f, "region:               {}", self.region)?;
        writeln!(f, "token expiry (days):  {}", self.token_expiry_days)?;
        writeln!(f, "max parallelism:      {}", self.max_parallelism)?;
        writeln!(f, "report:               {}", self.report_path.display())?;
        writeln!(f, "sql server base:      {}", self.sql.server_base_name)?;
        writeln!(f, "sql database:         {}", self.sql.database_name)?;
        writeln!(f, "sql admin:            {}", self.sql.administrator_login)?;
        writeln!(
            f,
            "sql admin password:   {}",
            masked(&self.sql.administrator_password)
        )?;
        writeln!(f, "import source:        {}", self.sql.import.source_uri)?;
        writeln!(
            f,
            "import storage key:   {}",
            masked(&self.sql.import.storage_key)
        )?;
        writeln!(
            f,
            "event hubs namespace: {}",
            self.event_hubs.namespace_base_name
        )?;
        writeln!(f, "event hub:            {}", self.event_hubs.hub_name)?;
        writeln!(
            f,
            "consumer group:       {}",
            self.event_hubs.consumer_group.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "access policy:        {}", self.event_hubs.policy_name)?;
        writeln!(f, "storage account base: {}", self.storage.account_base_name)?;
        write!(f, "storage container:    {}", self.storage.container_name)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const SETTINGS: &str = r#"{
        "resource_group": "rg-workshop",
        "token_expiry_days": 7,
        "sql": {
            "server_base_name": "sqlws",
            "administrator_login": "labadmin",
            "administrator_password": "secret",
            "import": { "source_uri": "https://share.blob.core.windows.net/data/lt.bacpac", "storage_key": "k" }
        },
        "event_hubs": { "namespace_base_name": "ehws", "hub_name": "changes" },
        "storage": { "account_base_name": "stws" }
    }"#;

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_settings_with_defaults() {
        let file = settings_file(SETTINGS);
        let config = get_config(file.path()).unwrap();
        assert_eq!(config.resource_group, "rg-workshop");
        assert_eq!(config.region, "westeurope");
        assert_eq!(config.max_parallelism, 4);
        assert_eq!(config.event_hubs.policy_name, "lab-access");
        assert_eq!(config.storage.container_name, "lab-data");
        assert!(config.event_hubs.consumer_group.is_none());
    }

    #[test]
    fn missing_settings_file_is_an_error() {
        let error = get_config(Path::new("/nonexistent/settings.json")).err().unwrap();
        assert!(matches!(error, ConfigError::SettingsNotFound(_)));
    }

    #[test]
    fn zero_expiry_is_rejected() {
        let file = settings_file(&SETTINGS.replace("\"token_expiry_days\": 7", "\"token_expiry_days\": 0"));
        let error = get_config(file.path()).err().unwrap();
        assert!(matches!(
            error,
            ConfigError::Invalid {
                key: "token_expiry_days",
                ..
            }
        ));
    }

    #[test]
    fn non_numeric_expiry_is_rejected() {
        let file = settings_file(&SETTINGS.replace("7,", "\"a week\","));
        assert!(matches!(
            get_config(file.path()).err().unwrap(),
            ConfigError::Extract(_)
        ));
    }

    #[test]
    fn missing_required_section_is_rejected() {
        let file = settings_file(r#"{ "resource_group": "rg", "token_expiry_days": 1 }"#);
        assert!(matches!(
            get_config(file.path()).err().unwrap(),
            ConfigError::Extract(_)
        ));
    }

    #[test]
    fn display_masks_secrets() {
        let file = settings_file(SETTINGS);
        let shown = get_config(file.path()).unwrap().to_string();
        assert!(shown.contains("labadmin"));
        assert!(!shown.contains("secret"));
    }
}
