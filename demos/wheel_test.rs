// Wheel test: drive one servo directly over serial, no zenoh
//
// Usage: cargo run --example wheel_test -- [port] [id]
// Example: cargo run --example wheel_test -- /dev/ttyUSB0 1
//
// Make sure the servo can spin freely before confirming.

use dynamixel_controller::config::{ActuatorParams, DEFAULT_PORT, SPEED_MAX};
use dynamixel_controller::controller::{DynamixelController, LogErrors, OutputDevice};
use dynamixel_controller::motor::{DynamixelBus, SerialDriver};
use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| DEFAULT_PORT.to_string());
    let id: u8 = match args.next() {
        Some(id) => id.parse()?,
        None => 1,
    };

    println!("Serial port: {}", port);
    println!("Servo id:    {}", id);
    println!();

    // Step 1: read-only check
    println!("Step 1: Pinging servo...");
    {
        let mut bus = DynamixelBus::open(&port)?;
        if !bus.ping(id)? {
            println!("  ✗ Servo {} NOT responding - aborting", id);
            return Ok(());
        }
    }
    println!("  ✓ Servo {} responding", id);
    println!();

    if !confirm("Switch the servo to wheel mode and spin it?") {
        println!("Aborted.");
        return Ok(());
    }

    // Step 2: build the controller (sets wheel mode)
    let params = ActuatorParams {
        id,
        ..ActuatorParams::default()
    };
    let driver = SerialDriver::new(vec![port]);
    let mut servo = DynamixelController::with_error_sink(driver, &params, Box::new(LogErrors));
    if let Err(e) = servo.init_status() {
        println!("  ✗ Failed to set wheel mode: {}", e);
        return Ok(());
    }
    servo.toggle_power(true);

    // Step 3: slow sweep through both directions
    let steps = [SPEED_MAX / 10, SPEED_MAX / 4, -SPEED_MAX / 10, -SPEED_MAX / 4, 0];
    for movement in steps {
        let status = servo.drive(movement);
        println!("  movement {:>5} -> speed word {:?}", movement, status.speed());
        if let Some(e) = status.error() {
            println!("    ✗ {}", e);
        }
        sleep(Duration::from_millis(800));
    }

    // Step 4: disable (sends a stop)
    servo.toggle_power(false);
    println!("  ✓ Servo stopped");

    Ok(())
}
