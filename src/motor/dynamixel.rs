// Dynamixel Protocol 1.0 serial bus (AX / MX series)
//
// Instruction packet: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Status packet:      [0xFF, 0xFF, ID, Length, Error, Params..., Checksum]

use serialport::{self, SerialPort};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Factory default baud rate for AX-12 servos
pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Packet header bytes
const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Write = 0x03,
}

/// Control table addresses shared by the AX and MX series
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    // EEPROM area
    CwAngleLimit = 6,  // 2 bytes
    CcwAngleLimit = 8, // 2 bytes

    // RAM area
    MovingSpeed = 32, // 2 bytes, bit 10 = direction in wheel mode
}

/// Servo family. Decides the joint-mode angle limit and whether multi-turn exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamixelType {
    Ax,
    Mx,
}

impl DynamixelType {
    /// Largest raw position, used as the CCW angle limit in joint mode
    pub fn max_position(self) -> u16 {
        match self {
            DynamixelType::Ax => 1023,
            DynamixelType::Mx => 4095,
        }
    }
}

/// Operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamixelMode {
    /// Continuous rotation, commanded by moving speed
    Wheel,
    /// Seeks a goal position within the angle limits
    Joint,
    /// MX only: position control over several turns
    MultiTurn,
}

/// Error types for Dynamixel communication
#[derive(Debug, thiserror::Error)]
pub enum DynamixelError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from servo {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for servo {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Servo {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from servo {id}")]
    Timeout { id: u8 },

    #[error("{mode:?} mode is not supported by {kind:?} servos")]
    Unsupported {
        kind: DynamixelType,
        mode: DynamixelMode,
    },

    #[error("No serial port configured for bus channel {channel}")]
    UnknownChannel { channel: u8 },
}

pub type Result<T> = std::result::Result<T, DynamixelError>;

/// One physical Dynamixel bus
pub struct DynamixelBus<P = Box<dyn SerialPort>> {
    port: P,
}

impl DynamixelBus {
    /// Open a bus at the factory default baud rate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }
}

impl<P: Read + Write> DynamixelBus<P> {
    /// Wrap an already opened port
    pub fn from_port(port: P) -> Self {
        Self { port }
    }

    /// Calculate checksum for a packet (excluding header)
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    /// Build a packet with header and checksum
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // params + instruction + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);

        packet
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_exact_or_timeout(&mut self, buf: &mut [u8], id: u8) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => {
                DynamixelError::Timeout { id }
            }
            _ => DynamixelError::Io(e),
        })
    }

    /// Read a status packet and return its parameters
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.read_exact_or_timeout(&mut header, expected_id)?;

        if header != HEADER {
            return Err(DynamixelError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.read_exact_or_timeout(&mut id_length, expected_id)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(DynamixelError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }
        if length < 2 {
            return Err(DynamixelError::InvalidResponse {
                id,
                reason: format!("Length {} too short for a status packet", length),
            });
        }

        // error + params + checksum
        let mut remaining = vec![0u8; length];
        self.read_exact_or_timeout(&mut remaining, id)?;

        let mut checksum_data = vec![id, length as u8];
        checksum_data.extend_from_slice(&remaining[..length - 1]);
        if Self::checksum(&checksum_data) != remaining[length - 1] {
            return Err(DynamixelError::ChecksumMismatch { id });
        }

        let error_status = remaining[0];
        if error_status != 0 {
            return Err(DynamixelError::MotorError {
                id,
                status: error_status,
            });
        }

        Ok(remaining[1..length - 1].to_vec())
    }

    /// Ping a servo to check if it's connected
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        match self.read_response(id) {
            Ok(_) => Ok(true),
            Err(DynamixelError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write two bytes (little-endian) to a register
    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        let packet = Self::build_packet(id, Instruction::Write, &[register as u8, lo, hi]);
        debug!("Write u16 to servo {}: reg={:?}, value={}", id, register, value);
        self.send_packet(&packet)?;

        self.read_response(id)?;
        Ok(())
    }

    // === Mode and motion ===

    /// Put a servo into `mode` by programming its angle limits
    pub fn set_mode(&mut self, id: u8, kind: DynamixelType, mode: DynamixelMode) -> Result<()> {
        let (cw, ccw) = match (mode, kind) {
            (DynamixelMode::Wheel, _) => (0, 0),
            (DynamixelMode::Joint, _) => (0, kind.max_position()),
            (DynamixelMode::MultiTurn, DynamixelType::Mx) => (4095, 4095),
            (DynamixelMode::MultiTurn, DynamixelType::Ax) => {
                return Err(DynamixelError::Unsupported { kind, mode });
            }
        };
        self.write_u16(id, Register::CwAngleLimit, cw)?;
        self.write_u16(id, Register::CcwAngleLimit, ccw)
    }

    /// Set the wheel-mode moving speed word
    pub fn spin_wheel(&mut self, id: u8, speed: u16) -> Result<()> {
        self.write_u16(id, Register::MovingSpeed, speed)
    }
}
