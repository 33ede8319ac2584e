// Servo control module
//
// Provides:
// - Dynamixel Protocol 1.0 serial bus implementation
// - The driver interface consumed by the controller, and a serial-backed driver

pub mod driver;
pub mod dynamixel;

pub use driver::{DynamixelDriver, DynamixelHandle, SerialDriver, SerialPins};
pub use dynamixel::{DynamixelBus, DynamixelError, DynamixelMode, DynamixelType};
