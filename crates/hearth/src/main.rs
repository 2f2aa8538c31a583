//! hearth CLI entry point.
//!
//! Results go to stdout as pretty JSON; logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use hearth_core::{ReconcileError, Reconciler, ReconcilerConfig, Validator, VmState};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod spec_file;

/// hearth - declarative lifecycle management for Multipass VMs
#[derive(Parser, Debug)]
#[command(name = "hearth")]
#[command(about = "Reconcile declared VM specs against Multipass")]
#[command(version)]
struct Cli {
    /// Path to the multipass binary
    #[arg(long = "multipass", global = true, env = "HEARTH_MULTIPASS_BIN")]
    multipass: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a spec file without touching multipass
    Validate {
        /// TOML spec file
        spec: PathBuf,
    },

    /// Create the instance a spec file declares
    Apply {
        /// TOML spec file
        spec: PathBuf,
    },

    /// Show one instance
    Get { name: String },

    /// Show every instance
    #[command(visible_alias = "ls")]
    List,

    /// Adopt an existing instance by name
    Import { name: String },

    /// Delete and purge an instance
    #[command(visible_alias = "rm")]
    Delete { name: String },

    /// Start a stopped or suspended instance
    Start {
        name: String,

        /// Wait until the instance is running (e.g. "2m")
        #[arg(long, value_parser = humantime::parse_duration)]
        wait: Option<Duration>,
    },

    /// Stop a running instance
    Stop { name: String },

    /// Restart an instance
    Restart { name: String },

    /// Suspend a running instance
    Suspend { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting hearth");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let fault = e
                .downcast_ref::<ReconcileError>()
                .map(|r| r.fault().to_string());
            tracing::error!(error = %e, ?fault, "command failed");
            match fault {
                Some(fault) => eprintln!("Error ({fault}): {e:#}"),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing subscriber. Logs go to stderr; stdout carries results.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hearth=info,hearth_core=info,hearth_multipass=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(multipass: Option<PathBuf>) -> ReconcilerConfig {
    let mut config = ReconcilerConfig::from_env();
    if let Some(path) = multipass {
        config = config.binary_path(path);
    }
    config.limits.check_cloud_init_exists = true;
    config
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.multipass);

    // Validation never spawns the tool, so it needs no usable binary
    let command = match cli.command {
        Commands::Validate { spec } => {
            return validate_file(&Validator::new(config.limits.clone()), &spec)
        }
        command => command,
    };

    config.validate().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");
    let reconciler = Reconciler::new(config);

    match command {
        Commands::Validate { spec } => validate_file(reconciler.validator(), &spec),
        Commands::Apply { spec } => {
            let spec = spec_file::load(&spec)?;
            print(&reconciler.create(&spec).await?)
        }
        Commands::Get { name } => print(&reconciler.registry().query(Some(&name)).await?),
        Commands::List => print(&reconciler.registry().query(None).await?),
        Commands::Import { name } => print(&reconciler.import(&name).await?),
        Commands::Delete { name } => {
            reconciler.delete(&name).await?;
            print(&json!({ "name": name, "deleted": true }))
        }
        Commands::Start { name, wait } => {
            reconciler.start(&name).await?;
            match wait {
                Some(timeout) => print(
                    &reconciler
                        .registry()
                        .wait_for_state(&name, &[VmState::Running], timeout)
                        .await?,
                ),
                None => print(&json!({ "name": name, "started": true })),
            }
        }
        Commands::Stop { name } => {
            reconciler.stop(&name).await?;
            print(&json!({ "name": name, "stopped": true }))
        }
        Commands::Restart { name } => {
            reconciler.restart(&name).await?;
            print(&json!({ "name": name, "restarted": true }))
        }
        Commands::Suspend { name } => {
            reconciler.suspend(&name).await?;
            print(&json!({ "name": name, "suspended": true }))
        }
    }
}

fn validate_file(validator: &Validator, path: &Path) -> anyhow::Result<()> {
    let spec = spec_file::load(path)?;
    let request = validator.validate(&spec).map_err(ReconcileError::from)?;
    print(&json!({
        "name": spec.name,
        "valid": true,
        "args": request.args(),
    }))
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
