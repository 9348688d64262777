//! CLI for the aeroponics unit
//!
//! Subcommands:
//! - `run`: run the unit against the real network, broker and GPIO
//! - `simulate`: run the same core against an in-memory broker (useful for smoke tests)

use std::path::PathBuf;
use std::time::Duration;

use aeroponics::config::{DEFAULT_CONFIG_PATH, Settings, load_config_from};
use aeroponics::link::{HostLink, ManualLink};
use aeroponics::queue::Message;
use aeroponics::scheduler::restart_device;
use aeroponics::session::{LoopbackBroker, MqttConnector};
use aeroponics::unit::{Hardware, Unit};
use aeroponics::utils::error::RestartReason;
use aeroponics::utils::logging;
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "aeroponics")]
enum Command {
    /// Run the unit
    Run {
        /// Configuration file, without extension
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Run against an in-memory broker, send a status request and a growlight
    /// command, then print what was published
    Simulate {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// How long to let the unit run
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let config = match &cmd {
        Command::Run { config } | Command::Simulate { config, .. } => config,
    };
    let settings = match load_config_from(config) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    match cmd {
        Command::Run { .. } => match run(settings).await {
            Ok(reason) => restart_device(&reason),
            Err(e) => {
                error!("Unit failed to start: {e}");
                std::process::exit(1);
            }
        },
        Command::Simulate { seconds, .. } => {
            if let Err(e) = simulate(settings, Duration::from_secs(seconds)).await {
                error!("Simulation failed: {e}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(settings: Settings) -> Result<RestartReason, Box<dyn std::error::Error>> {
    let hardware = Hardware::from_settings(&settings)?;
    let adapter = HostLink::new(settings.wifi.probe_addr.clone());
    let connector = MqttConnector::new(settings.unit.unit_id(), &settings.mqtt);
    let unit = Unit::new(settings, adapter, connector, hardware);
    Ok(unit.run().await)
}

async fn simulate(settings: Settings, duration: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let broker = LoopbackBroker::new();
    let hardware = Hardware::simulated(&settings)?;
    broker.inject(Message::new(settings.topics.status_request.as_str(), ""));
    broker.inject(Message::new(
        settings.topics.control.as_str(),
        json!({ "relay|growlight": 1 }).to_string(),
    ));

    let unit = Unit::new(settings, ManualLink::available(), broker.connector(), hardware);
    tokio::select! {
        reason = unit.run() => {
            error!(%reason, "unit stopped before the simulation ended");
        }
        _ = tokio::time::sleep(duration) => {}
    }

    for message in broker.published() {
        info!(topic = %message.topic, payload = %message.payload, "published");
    }
    Ok(())
}
