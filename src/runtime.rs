// 50 Hz loop with watchdog
// If commands stop arriving the servo is driven at zero speed until a fresh
// movement command shows up.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_MOVE, TOPIC_CMD_POWER, TOPIC_HEALTH};
use crate::controller::OutputDevice;
use crate::messages::{MoveCommand, PowerCommand, RuntimeHealth};

pub struct Runtime {
    latest_cmd: Option<MoveCommand>,
    cmd_received_at: Instant,
    timeout: Duration,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_timeout(CMD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming movement command
    pub fn on_command(&mut self, cmd: MoveCommand) {
        self.on_command_at(cmd, Instant::now());
    }

    fn on_command_at(&mut self, cmd: MoveCommand, at: Instant) {
        info!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = at;
    }

    /// Movement to apply this tick, zero when the watchdog has fired
    pub fn compute_movement(&mut self) -> i32 {
        self.compute_movement_at(Instant::now())
    }

    fn compute_movement_at(&mut self, now: Instant) -> i32 {
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);

        if cmd_age > self.timeout {
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping servo", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            0
        } else if let Some(cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            cmd.movement
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            0
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub type RunResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Run the command loop until it fails or `shutdown` resolves.
///
/// The device is disabled on the way out either way, which sends a stop.
pub async fn run<O, S>(device: &mut O, shutdown: S) -> RunResult
where
    O: OutputDevice,
    S: Future<Output = ()>,
{
    let outcome = tokio::select! {
        result = command_loop(device) => result,
        _ = shutdown => {
            info!("Shutdown requested");
            Ok(())
        }
    };
    stop_on_exit(device, outcome)
}

fn stop_on_exit<O: OutputDevice>(device: &mut O, outcome: RunResult) -> RunResult {
    if let Err(e) = &outcome {
        warn!("Command loop failed: {}", e);
    }
    info!("Stopping servo");
    device.toggle_power(false);
    outcome
}

async fn command_loop<O: OutputDevice>(device: &mut O) -> RunResult {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_move = session.declare_subscriber(TOPIC_CMD_MOVE).await?;
    let sub_power = session.declare_subscriber(TOPIC_CMD_POWER).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_MOVE, TOPIC_CMD_POWER);
    info!("Publishing to: {}", TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Apply power changes before movement
        while let Ok(Some(sample)) = sub_power.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<PowerCommand>(&payload) {
                Ok(cmd) => {
                    info!("Power command: {}", if cmd.on { "on" } else { "off" });
                    device.toggle_power(cmd.on);
                }
                Err(e) => warn!("Failed to parse power command: {}", e),
            }
        }

        // 2. Drain all pending movement commands, keep latest
        while let Ok(Some(sample)) = sub_move.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<MoveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse move command: {}", e),
            }
        }

        // 3. Drive (includes watchdog logic); a disabled device ignores it
        let movement = runtime.compute_movement();
        let _ = device.drive(movement);

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}
