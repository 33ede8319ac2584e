// Single-servo output device
//
// Turns a signed speed on the SPEED_MIN..=SPEED_MAX scale into a wheel-mode
// moving speed word and hands it to the driver. Output stays off until
// `toggle_power(true)`.

use tracing::{debug, info, warn};

use crate::config::{
    ActuatorParams, DYNA_SPEED_CCW_MAX, DYNA_SPEED_CCW_MIN, DYNA_SPEED_CW_MAX, DYNA_SPEED_CW_MIN,
    SPEED_MAX,
};
use crate::motor::{DynamixelDriver, DynamixelError, DynamixelHandle, DynamixelMode, SerialPins};

/// How a device interprets the value passed to `drive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Speed,
    Position,
}

/// Generic output device driven by a control loop
pub trait OutputDevice {
    type Status;

    /// `None` when the device was built in a mode it has no interpretation for
    fn input_type(&self) -> Option<InputType>;

    fn drive(&mut self, movement: i32) -> Self::Status;

    fn toggle_power(&mut self, power_on: bool);

    fn is_enabled(&self) -> bool;
}

/// Receives driver failures the controller does not act on
pub trait ErrorSink {
    fn report(&mut self, context: &'static str, error: &DynamixelError);
}

/// Drops every error. The controller's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl ErrorSink for Discard {
    fn report(&mut self, _context: &'static str, _error: &DynamixelError) {}
}

/// Logs every error as a warning
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrors;

impl ErrorSink for LogErrors {
    fn report(&mut self, context: &'static str, error: &DynamixelError) {
        warn!("{} failed: {}", context, error);
    }
}

/// Outcome of one `drive` call. Inspecting it is optional.
#[derive(Debug)]
pub enum CommandStatus {
    /// Output disabled, nothing was sent
    Suppressed,
    /// `speed` was handed to the driver
    Sent {
        speed: u16,
        result: Result<(), DynamixelError>,
    },
}

impl CommandStatus {
    pub fn speed(&self) -> Option<u16> {
        match self {
            CommandStatus::Sent { speed, .. } => Some(*speed),
            CommandStatus::Suppressed => None,
        }
    }

    pub fn error(&self) -> Option<&DynamixelError> {
        match self {
            CommandStatus::Sent { result: Err(e), .. } => Some(e),
            _ => None,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, CommandStatus::Sent { .. })
    }
}

/// Integer linear remap with truncating division.
///
/// Evaluated as-is for inputs outside `in_min..=in_max` and for reversed
/// output ranges; callers rely on the exact values this produces.
pub fn remap(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Moving speed word for a (possibly already inverted) movement
pub fn wheel_speed(movement: i64) -> u16 {
    let speed_max = SPEED_MAX as i64;
    let word = if movement < 0 {
        remap(
            movement,
            0,
            speed_max,
            DYNA_SPEED_CCW_MAX as i64,
            DYNA_SPEED_CCW_MIN as i64,
        )
    } else if movement > 0 {
        remap(
            movement,
            0,
            speed_max,
            DYNA_SPEED_CW_MAX as i64,
            DYNA_SPEED_CW_MIN as i64,
        )
    } else {
        0
    };
    // wraps modulo 2^16 for out-of-range movements
    word as u16
}

/// Controller for one Dynamixel servo
pub struct DynamixelController<D: DynamixelDriver> {
    driver: D,
    handle: DynamixelHandle,
    pins: SerialPins,
    baud: u32,
    invert: bool,
    input_type: Option<InputType>,
    enabled: bool,
    init_status: Result<(), DynamixelError>,
    errors: Box<dyn ErrorSink>,
}

impl<D: DynamixelDriver> DynamixelController<D> {
    /// Initialize the servo and set its mode, discarding any failure
    pub fn new(driver: D, params: &ActuatorParams) -> Self {
        Self::with_error_sink(driver, params, Box::new(Discard))
    }

    /// Like `new`, routing every driver failure to `errors`
    pub fn with_error_sink(
        mut driver: D,
        params: &ActuatorParams,
        mut errors: Box<dyn ErrorSink>,
    ) -> Self {
        let input_type = match params.mode {
            DynamixelMode::Wheel => Some(InputType::Speed),
            DynamixelMode::Joint => Some(InputType::Position),
            DynamixelMode::MultiTurn => None,
        };

        let handle = driver.initialize(
            params.pins,
            params.kind,
            params.id,
            params.bus_channel,
            params.baud,
        );
        let init_status = driver.set_mode(&handle, params.mode);
        if let Err(e) = &init_status {
            errors.report("set_mode", e);
        }

        info!(
            "Servo {} ({:?}) on channel {} in {:?} mode{}",
            params.id,
            params.kind,
            params.bus_channel,
            params.mode,
            if params.upside_down { ", inverted" } else { "" }
        );
        if params.mode != DynamixelMode::Wheel {
            // drive() has no position path and always sends wheel speeds
            warn!(
                "Servo {} configured for {:?} mode, drive() only produces wheel speeds",
                params.id, params.mode
            );
        }

        Self {
            driver,
            handle,
            pins: params.pins,
            baud: params.baud,
            invert: params.upside_down,
            input_type,
            enabled: false,
            init_status,
            errors,
        }
    }

    /// Result of the mode-set call made during construction
    pub fn init_status(&self) -> Result<(), &DynamixelError> {
        self.init_status.as_ref().map(|_| ())
    }

    pub fn handle(&self) -> &DynamixelHandle {
        &self.handle
    }

    pub fn pins(&self) -> SerialPins {
        self.pins
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn send(&mut self, speed: u16) -> CommandStatus {
        debug!("Servo {} speed word {}", self.handle.id, speed);
        let result = self.driver.spin_wheel(&self.handle, speed);
        if let Err(e) = &result {
            self.errors.report("spin_wheel", e);
        }
        CommandStatus::Sent { speed, result }
    }
}

impl<D: DynamixelDriver> OutputDevice for DynamixelController<D> {
    type Status = CommandStatus;

    fn input_type(&self) -> Option<InputType> {
        self.input_type
    }

    fn drive(&mut self, movement: i32) -> CommandStatus {
        if !self.enabled {
            return CommandStatus::Suppressed;
        }

        let mut movement = movement as i64;
        if self.invert {
            movement = -movement;
        }

        self.send(wheel_speed(movement))
    }

    fn toggle_power(&mut self, power_on: bool) {
        if !power_on {
            // stop is sent even when already disabled
            self.send(0);
        }

        if power_on != self.enabled {
            info!(
                "Servo {} output {}",
                self.handle.id,
                if power_on { "enabled" } else { "disabled" }
            );
        }
        self.enabled = power_on;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
