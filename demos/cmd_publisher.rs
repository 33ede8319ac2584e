// Keyboard teleop: W/S spin forward/reverse, R/F speed, E/D enable/disable, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use dynamixel_controller::config::{TOPIC_CMD_MOVE, TOPIC_CMD_POWER};
use dynamixel_controller::messages::{MoveCommand, PowerCommand};
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [i32; 3] = [150, 500, 1000]; // logical speed scale
const INPUT_TIMEOUT_MS: u64 = 100; // Reset movement after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_move = session.declare_publisher(TOPIC_CMD_MOVE).await?;
    let pub_power = session.declare_publisher(TOPIC_CMD_POWER).await?;

    info!("Controls: W/S=spin, R/F=speed, E=enable, D=disable, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&pub_move, &pub_power).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_move: &zenoh::pubsub::Publisher<'_>,
    pub_power: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut movement = 0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        movement = SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        movement = -SPEEDS[speed_idx];
                        last_movement_input = Instant::now();
                    }

                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('e') if pressed => {
                        info!("Enable");
                        let cmd = serde_json::to_string(&PowerCommand { on: true })?;
                        pub_power.put(cmd).await?;
                    }
                    KeyCode::Char('d') if pressed => {
                        info!("Disable");
                        let cmd = serde_json::to_string(&PowerCommand { on: false })?;
                        pub_power.put(cmd).await?;
                    }

                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            movement = 0;
        }

        // Always publish at ~50Hz
        let cmd = serde_json::to_string(&MoveCommand { movement })?;
        pub_move.put(cmd).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
