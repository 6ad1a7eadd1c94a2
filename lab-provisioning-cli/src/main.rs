mod console;
mod error;
mod menu;

use core::time::Duration;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::Console;
use error::CliError;
use lab_provisioning_config::{get_config, load_roster, AttendeeRecord, Config, ConfigError};
use lab_provisioning_orchestrator::{
    AssumeYes, Confirmation, Orchestrator, ProvisioningError, SystemClock,
};
use lab_provisioning_provider::{BulkImport, CloudProvider, ProviderError, SimulatedProvider};
use lab_provisioning_telemetry::setup_telemetry;
use menu::MenuCommand;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "lab-provisioning", version)]
#[command(about = "Create, list and delete the cloud lab environments of workshop attendees")]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true, default_value = "settings.json")]
    settings: PathBuf,

    /// Attendee roster, one name per line with an optional `,email`
    #[arg(long, global = true, default_value = "attendees.txt")]
    roster: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (the default)
    Menu,
    /// Show the current configuration
    Config,
    /// Show the attendees
    Roster,
    /// List all resources in the resource group
    List,
    /// Create lab resources
    Create {
        /// Only this attendee instead of the whole roster
        #[arg(long)]
        attendee: Option<String>,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Delete lab resources
    Delete {
        /// Only this attendee instead of every lab resource
        #[arg(long)]
        attendee: Option<String>,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

/// Cancels the current action on Ctrl-C, for as long as it lives.
struct CtrlC {
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
}

impl CtrlC {
    fn watch() -> Self {
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, letting in-flight steps finish");
                    cancel.cancel();
                }
            }
        });
        Self { cancel, watcher }
    }
}

impl Drop for CtrlC {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

struct App {
    orchestrator: Orchestrator,
    roster: Vec<AttendeeRecord>,
    console: Console,
}

impl App {
    fn confirmation(&self, assume_yes: bool) -> &dyn Confirmation {
        if assume_yes {
            &AssumeYes
        } else {
            &self.console
        }
    }

    async fn dispatch(&self, command: MenuCommand, assume_yes: bool) -> Result<(), CliError> {
        let confirmation = self.confirmation(assume_yes);
        match command {
            MenuCommand::ViewConfig => println!("{}", self.orchestrator.config()),
            MenuCommand::ShowRoster => {
                for (index, attendee) in self.roster.iter().enumerate() {
                    match &attendee.email {
                        Some(email) => println!("{:>3}. {} <{email}>", index + 1, attendee.name),
                        None => println!("{:>3}. {}", index + 1, attendee.name),
                    }
                }
            }
            MenuCommand::List => {
                let handles = self.orchestrator.list_all().await?;
                for handle in &handles {
                    println!("{:<72} {:?}", handle.reference.path(), handle.state);
                }
                println!("{} resources", handles.len());
            }
            MenuCommand::Create(attendee) => {
                let ctrl_c = CtrlC::watch();
                let mut stdout = std::io::stdout();
                let summary = match attendee {
                    Some(name) => {
                        self.orchestrator
                            .create_one(&name, &self.roster, confirmation, &ctrl_c.cancel, &mut stdout)
                            .await?
                    }
                    None => {
                        self.orchestrator
                            .create_all(&self.roster, confirmation, &ctrl_c.cancel, &mut stdout)
                            .await?
                    }
                };
                println!(
                    "{} attendees processed, {} fully provisioned, in {:.1?}{}",
                    summary.attempted,
                    summary.fully_provisioned,
                    summary.elapsed,
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
            }
            MenuCommand::Delete(attendee) => {
                let ctrl_c = CtrlC::watch();
                let summary = match attendee {
                    Some(name) => {
                        self.orchestrator
                            .delete_one(&name, &self.roster, confirmation, &ctrl_c.cancel)
                            .await?
                    }
                    None => {
                        self.orchestrator
                            .delete_all(confirmation, &ctrl_c.cancel)
                            .await?
                    }
                };
                println!(
                    "{} resources deleted, {} failed, in {:.1?}{}",
                    summary.deleted,
                    summary.failed,
                    summary.elapsed,
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
            }
            MenuCommand::Quit => {}
        }
        Ok(())
    }

    async fn interactive(&self) -> Result<(), CliError> {
        loop {
            println!("\n{}", menu::render());
            let line = tokio::select! {
                line = self.console.prompt("> ") => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                return Ok(());
            };
            let command = match menu::parse(&line) {
                Ok(MenuCommand::Quit) => return Ok(()),
                Ok(command) => command,
                Err(error) => {
                    println!("{error}");
                    continue;
                }
            };
            // a failed action returns to the menu
            if let Err(error) = self.dispatch(command, false).await {
                report_failure(&error);
            }
        }
    }
}

fn report_failure(error: &CliError) {
    if matches!(
        error,
        CliError::Provisioning(ProvisioningError::ConfirmationDeclined)
    ) {
        println!("Nothing was changed.");
    } else {
        error!(%error, "action failed");
    }
}

async fn open_provider(config: &Config) -> Result<SimulatedProvider, ProviderError> {
    let provider = match &config.provider.state_file {
        Some(path) => SimulatedProvider::open(config.resource_group.clone(), path.clone()).await?,
        None => SimulatedProvider::new(config.resource_group.clone()),
    };
    let provider = provider.with_latency(Duration::from_millis(config.provider.latency_ms));
    Ok(match config.provider.max_concurrent_requests {
        Some(max) => provider.with_max_in_flight(max),
        None => provider,
    })
}

async fn run(cli: Cli, config: Result<Config, ConfigError>) -> Result<(), CliError> {
    let config = Arc::new(config?);
    let roster = load_roster(&cli.roster)?;
    let provider = Arc::new(open_provider(&config).await?);
    let orchestrator = Orchestrator::new(
        config,
        Arc::clone(&provider) as Arc<dyn CloudProvider>,
        provider as Arc<dyn BulkImport>,
        Arc::new(SystemClock),
    );
    let app = App {
        orchestrator,
        roster,
        console: Console::new(),
    };
    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => app.interactive().await,
        Commands::Config => app.dispatch(MenuCommand::ViewConfig, false).await,
        Commands::Roster => app.dispatch(MenuCommand::ShowRoster, false).await,
        Commands::List => app.dispatch(MenuCommand::List, false).await,
        Commands::Create { attendee, yes } => app.dispatch(MenuCommand::Create(attendee), yes).await,
        Commands::Delete { attendee, yes } => app.dispatch(MenuCommand::Delete(attendee), yes).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = get_config(&cli.settings);
    let otlp_endpoint = config
        .as_ref()
        .ok()
        .and_then(|config| config.telemetry.otlp_endpoint.as_deref());
    let _telemetry = match setup_telemetry(otlp_endpoint) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Provisioning(ProvisioningError::ConfirmationDeclined)) => {
            println!("Nothing was changed.");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "aborted");
            ExitCode::FAILURE
        }
    }
}
