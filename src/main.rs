use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dynamixel_controller::config::ControllerConfig;
use dynamixel_controller::controller::{DynamixelController, LogErrors, OutputDevice};
use dynamixel_controller::motor::SerialDriver;

#[derive(Parser)]
#[command(version, about = "Drive a single Dynamixel servo in wheel mode")]
struct Cli {
    /// JSON config file (ports and servo parameters)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial device for bus channel 0, overrides the config file
    #[arg(long, global = true)]
    port: Option<String>,

    /// Servo id, overrides the config file
    #[arg(long, global = true)]
    id: Option<u8>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow move/power commands published over zenoh
    Run,
    /// Spin at a speed for a while, then stop
    Spin {
        /// Speed on the -1000..=1000 scale
        #[arg(allow_hyphen_values = true)]
        speed: i32,
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
    },
    /// Send a single stop command
    Stop,
}

fn load_config(cli: &Cli) -> Result<ControllerConfig, Box<dyn std::error::Error + Send + Sync>> {
    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(port) = &cli.port {
        match config.ports.first_mut() {
            Some(first) => *first = port.clone(),
            None => config.ports.push(port.clone()),
        }
    }
    if let Some(id) = cli.id {
        config.actuator.id = id;
    }
    Ok(config)
}

async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = load_config(&cli)?;
    info!("Using ports {:?}", config.ports);

    let driver = SerialDriver::new(config.ports.clone());
    let mut controller =
        DynamixelController::with_error_sink(driver, &config.actuator, Box::new(LogErrors));
    if let Err(e) = controller.init_status() {
        return Err(format!("servo {} did not accept its mode: {}", config.actuator.id, e).into());
    }

    match cli.command {
        Command::Run => {
            dynamixel_controller::runtime::run(&mut controller, ctrl_c()).await?;
        }
        Command::Spin { speed, duration_ms } => {
            controller.toggle_power(true);
            let status = controller.drive(speed);
            info!("Sent speed word {:?}", status.speed());
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            controller.toggle_power(false);
        }
        Command::Stop => {
            // disabling always sends a stop
            controller.toggle_power(false);
        }
    }
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    if let Err(e) = execute(Cli::parse()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
