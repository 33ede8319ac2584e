// Driver interface the controller talks to
//
// The controller only ever needs three entry points: initialize a servo
// record, put it in a mode, and send it a wheel speed. `SerialDriver` backs
// them with real Dynamixel buses; tests substitute a recording double.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dynamixel::{DynamixelBus, DynamixelError, DynamixelMode, DynamixelType, Result};

/// Transmit/receive pin ids, passed through untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SerialPins {
    pub tx: u32,
    pub rx: u32,
}

/// Addressing record for one servo, produced by `initialize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamixelHandle {
    pub pins: SerialPins,
    pub kind: DynamixelType,
    pub id: u8,
    pub channel: u8,
    pub baud: u32,
}

/// Low-level servo driver capability
pub trait DynamixelDriver {
    fn initialize(
        &mut self,
        pins: SerialPins,
        kind: DynamixelType,
        id: u8,
        channel: u8,
        baud: u32,
    ) -> DynamixelHandle;

    fn set_mode(&mut self, handle: &DynamixelHandle, mode: DynamixelMode) -> Result<()>;

    fn spin_wheel(&mut self, handle: &DynamixelHandle, speed: u16) -> Result<()>;
}

impl<D: DynamixelDriver + ?Sized> DynamixelDriver for &mut D {
    fn initialize(
        &mut self,
        pins: SerialPins,
        kind: DynamixelType,
        id: u8,
        channel: u8,
        baud: u32,
    ) -> DynamixelHandle {
        (**self).initialize(pins, kind, id, channel, baud)
    }

    fn set_mode(&mut self, handle: &DynamixelHandle, mode: DynamixelMode) -> Result<()> {
        (**self).set_mode(handle, mode)
    }

    fn spin_wheel(&mut self, handle: &DynamixelHandle, speed: u16) -> Result<()> {
        (**self).spin_wheel(handle, speed)
    }
}

/// Driver backed by serial ports, one per bus channel
pub struct SerialDriver {
    ports: Vec<String>,
    bauds: HashMap<u8, u32>,
    buses: HashMap<u8, DynamixelBus>,
}

impl SerialDriver {
    /// `ports[n]` is the serial device used for bus channel `n`
    pub fn new(ports: Vec<String>) -> Self {
        Self {
            ports,
            bauds: HashMap::new(),
            buses: HashMap::new(),
        }
    }

    /// Open the bus for `channel` on first use
    fn bus(&mut self, channel: u8) -> Result<&mut DynamixelBus> {
        if !self.buses.contains_key(&channel) {
            let path = self
                .ports
                .get(channel as usize)
                .ok_or(DynamixelError::UnknownChannel { channel })?;
            let baud = self
                .bauds
                .get(&channel)
                .copied()
                .unwrap_or(super::dynamixel::DEFAULT_BAUDRATE);

            info!("Opening Dynamixel bus {} on {} at {} baud", channel, path, baud);
            let bus = DynamixelBus::open_with_baudrate(path, baud)?;
            self.buses.insert(channel, bus);
        }
        self.buses
            .get_mut(&channel)
            .ok_or(DynamixelError::UnknownChannel { channel })
    }
}

impl DynamixelDriver for SerialDriver {
    fn initialize(
        &mut self,
        pins: SerialPins,
        kind: DynamixelType,
        id: u8,
        channel: u8,
        baud: u32,
    ) -> DynamixelHandle {
        debug!(
            "Initializing {:?} servo {} on channel {} (pins tx={} rx={})",
            kind, id, channel, pins.tx, pins.rx
        );
        // A bus already opened at another baud keeps its rate.
        self.bauds.entry(channel).or_insert(baud);
        DynamixelHandle {
            pins,
            kind,
            id,
            channel,
            baud,
        }
    }

    fn set_mode(&mut self, handle: &DynamixelHandle, mode: DynamixelMode) -> Result<()> {
        self.bus(handle.channel)?.set_mode(handle.id, handle.kind, mode)
    }

    fn spin_wheel(&mut self, handle: &DynamixelHandle, speed: u16) -> Result<()> {
        self.bus(handle.channel)?.spin_wheel(handle.id, speed)
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Initialize {
            pins: SerialPins,
            kind: DynamixelType,
            id: u8,
            channel: u8,
            baud: u32,
        },
        SetMode(DynamixelMode),
        SpinWheel(u16),
    }

    /// Records every call; optionally fails `spin_wheel` / `set_mode`
    #[derive(Default)]
    pub(crate) struct RecordingDriver {
        pub calls: Vec<Call>,
        pub fail_spin: bool,
        pub fail_mode: bool,
    }

    impl RecordingDriver {
        pub fn spins(&self) -> Vec<u16> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::SpinWheel(speed) => Some(*speed),
                    _ => None,
                })
                .collect()
        }
    }

    impl DynamixelDriver for RecordingDriver {
        fn initialize(
            &mut self,
            pins: SerialPins,
            kind: DynamixelType,
            id: u8,
            channel: u8,
            baud: u32,
        ) -> DynamixelHandle {
            self.calls.push(Call::Initialize {
                pins,
                kind,
                id,
                channel,
                baud,
            });
            DynamixelHandle {
                pins,
                kind,
                id,
                channel,
                baud,
            }
        }

        fn set_mode(&mut self, handle: &DynamixelHandle, mode: DynamixelMode) -> Result<()> {
            self.calls.push(Call::SetMode(mode));
            if self.fail_mode {
                return Err(DynamixelError::Timeout { id: handle.id });
            }
            Ok(())
        }

        fn spin_wheel(&mut self, handle: &DynamixelHandle, speed: u16) -> Result<()> {
            self.calls.push(Call::SpinWheel(speed));
            if self.fail_spin {
                return Err(DynamixelError::MotorError {
                    id: handle.id,
                    status: 0x20,
                });
            }
            Ok(())
        }
    }
}
