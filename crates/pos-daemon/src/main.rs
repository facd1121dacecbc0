//! Peripheral supervisor daemon.
//!
//! Wires every peripheral manager against simulated drivers, keeps them
//! connected in the background and logs availability changes until Ctrl-C.

mod config;
mod simulation;

use anyhow::{Context, Result};
use clap::Parser;
use config::DaemonConfig;
use pos_hardware::DeviceRegistry;
use pos_hardware::registry::FileRegistry;
use pos_manager::{AvailabilityAggregator, DeviceDescriptors, ReconnectScheduler};
use simulation::{SimulatedStation, simulation_registry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pos-daemon", version, about = "Point-of-sale peripheral supervisor")]
struct Cli {
    /// Configuration file (TOML). Defaults apply when it does not exist.
    #[arg(short, long, default_value = "pos-daemon.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, conflicts_with = "quiet")]
    debug: bool,

    /// Log warnings and errors only.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    if let Err(e) = run(cli).await {
        error!(error = %e, "pos-daemon failed");
        eprintln!("pos-daemon: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = DaemonConfig::load(&cli.config)?;

    let registry: Arc<dyn DeviceRegistry> = match &config.registry {
        Some(path) => {
            info!(path = %path.display(), "Using registry file");
            Arc::new(FileRegistry::new(path))
        }
        None => Arc::new(simulation_registry()),
    };
    let descriptors = match &config.descriptors {
        Some(path) => DeviceDescriptors::load(path)
            .with_context(|| format!("loading descriptors from {}", path.display()))?,
        None => DeviceDescriptors::empty(),
    };

    let station = SimulatedStation::build(registry, &config.simulate, &config.devices);
    let managers = station.managers();
    let aggregator = Arc::new(AvailabilityAggregator::new(managers.clone(), descriptors));

    let mut errors = aggregator.subscribe();
    let error_log = tokio::spawn(async move {
        while let Some(snapshot) = errors.recv().await {
            if snapshot.is_clear() {
                info!(at = %snapshot.timestamp, "Device errors cleared");
            } else {
                let devices: Vec<&str> =
                    snapshot.devices.iter().map(|kind| kind.as_str()).collect();
                warn!(at = %snapshot.timestamp, devices = ?devices, "Device errors");
            }
        }
    });

    let scheduler = ReconnectScheduler::new(managers, config.devices.reconnect_interval())
        .with_availability(aggregator.clone())
        .start();
    info!("pos-daemon running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down");

    scheduler.shutdown().await;
    let availability = tokio::task::spawn_blocking(move || aggregator.availability()).await?;
    for record in availability {
        info!(
            device = %record.category,
            name = %record.device_name,
            ready = record.ready,
            "Final availability"
        );
    }

    error_log.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_flags() {
        let cli = Cli::parse_from(["pos-daemon", "--debug"]);
        assert_eq!(cli.log_level(), "debug");
        let cli = Cli::parse_from(["pos-daemon", "-q", "-c", "station.toml"]);
        assert_eq!(cli.log_level(), "warn");
        assert_eq!(cli.config, PathBuf::from("station.toml"));
        assert!(Cli::try_parse_from(["pos-daemon", "--debug", "--quiet"]).is_err());
    }
}
