//! Fixtures for driving whole runs against the simulated provider.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone as _, Utc};
use lab_provisioning_config::{get_config, load_roster, AttendeeRecord, Config};
use lab_provisioning_orchestrator::{FixedClock, Orchestrator};
use lab_provisioning_provider::{BulkImport, CloudProvider, SimulatedProvider};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub type FixtureResult<T> = Result<T, Box<dyn Error>>;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .try_init();
}

#[must_use]
pub fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("2024-01-01T00:00:00Z is a valid timestamp")
}

/// A workshop with settings and roster files in a temporary directory.
pub struct Workshop {
    pub dir: TempDir,
    pub config: Arc<Config>,
    pub roster: Vec<AttendeeRecord>,
    pub provider: Arc<SimulatedProvider>,
    pub orchestrator: Orchestrator,
}

impl Workshop {
    pub fn new(roster: &str) -> FixtureResult<Self> {
        Self::with_provider(roster, SimulatedProvider::new("rg-workshop"), 4)
    }

    pub fn with_provider(
        roster: &str,
        provider: SimulatedProvider,
        max_parallelism: usize,
    ) -> FixtureResult<Self> {
        init_logging();
        let dir = tempfile::tempdir()?;
        let settings = serde_json::json!({
            "resource_group": "rg-workshop",
            "token_expiry_days": 1,
            "max_parallelism": max_parallelism,
            "report_path": dir.path().join("attendee-resources.csv"),
            "sql": {
                "server_base_name": "sqlws-",
                "administrator_login": "labadmin",
                "administrator_password": "P@ssw0rd!",
                "database_name": "labdb",
                "import": {
                    "source_uri": "https://share.blob.core.windows.net/data/lt.bacpac",
                    "storage_key": "c2hhcmVk"
                }
            },
            "event_hubs": {
                "namespace_base_name": "ehws-",
                "hub_name": "changes",
                "consumer_group": "lab"
            },
            "storage": { "account_base_name": "stws" }
        });
        let settings_path = dir.path().join("settings.json");
        std::fs::write(&settings_path, serde_json::to_vec_pretty(&settings)?)?;
        let roster_path = dir.path().join("attendees.txt");
        std::fs::write(&roster_path, roster)?;

        let config = Arc::new(get_config(&settings_path)?);
        let roster = load_roster(&roster_path)?;
        let provider = Arc::new(provider);
        let orchestrator = Orchestrator::new(
            Arc::clone(&config),
            Arc::clone(&provider) as Arc<dyn CloudProvider>,
            Arc::clone(&provider) as Arc<dyn BulkImport>,
            Arc::new(FixedClock(new_year())),
        );
        Ok(Self {
            dir,
            config,
            roster,
            provider,
            orchestrator,
        })
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.config.report_path.clone()
    }

    pub fn report(&self) -> FixtureResult<String> {
        Ok(std::fs::read_to_string(self.report_path())?)
    }

    /// Data rows of the report, header excluded.
    pub fn report_rows(&self) -> FixtureResult<Vec<csv::StringRecord>> {
        let mut reader = csv::Reader::from_path(self.report_path())?;
        Ok(reader.records().collect::<Result<_, _>>()?)
    }
}
