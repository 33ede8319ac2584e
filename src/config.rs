// Timeouts, topics, speed scale and servo configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::motor::{DynamixelMode, DynamixelType, SerialPins};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_MOVE: &str = "dynamixel/cmd/move"; // movement commands
pub const TOPIC_CMD_POWER: &str = "dynamixel/cmd/power"; // enable / disable
pub const TOPIC_HEALTH: &str = "dynamixel/state/health"; // health status

// Serial port used for bus channel 0 when no config file is given
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

// Logical speed scale accepted by the controller
pub const SPEED_MIN: i32 = -1000;
pub const SPEED_MAX: i32 = 1000;

// Wheel-mode moving speed words: 0..=1023 turns CCW, 1024..=2047 turns CW
pub const DYNA_SPEED_CW_MAX: u16 = 2047;
pub const DYNA_SPEED_CW_MIN: u16 = 1024;
pub const DYNA_SPEED_CCW_MAX: u16 = 1023;
pub const DYNA_SPEED_CCW_MIN: u16 = 0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Construction parameters for one servo controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorParams {
    pub pins: SerialPins,
    pub upside_down: bool,
    pub kind: DynamixelType,
    pub id: u8,
    pub bus_channel: u8,
    pub baud: u32,
    pub mode: DynamixelMode,
}

impl Default for ActuatorParams {
    fn default() -> Self {
        Self {
            pins: SerialPins::default(),
            upside_down: false,
            kind: DynamixelType::Ax,
            id: 1,
            bus_channel: 0,
            baud: crate::motor::dynamixel::DEFAULT_BAUDRATE,
            mode: DynamixelMode::Wheel,
        }
    }
}

/// Contents of the JSON config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Serial device per bus channel, indexed by channel
    pub ports: Vec<String>,
    pub actuator: ActuatorParams,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ports: vec![DEFAULT_PORT.to_string()],
            actuator: ActuatorParams::default(),
        }
    }
}

impl ControllerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: ControllerConfig = serde_json::from_str(
            r#"{
                "ports": ["/dev/ttyACM0", "/dev/ttyACM1"],
                "actuator": { "id": 4, "bus_channel": 1, "upside_down": true, "kind": "mx" }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.ports.len(), 2);
        assert_eq!(cfg.actuator.id, 4);
        assert_eq!(cfg.actuator.bus_channel, 1);
        assert!(cfg.actuator.upside_down);
        assert_eq!(cfg.actuator.kind, DynamixelType::Mx);
        assert_eq!(cfg.actuator.mode, DynamixelMode::Wheel);
        assert_eq!(cfg.actuator.baud, 1_000_000);
    }

    #[test]
    fn test_mode_names() {
        let params: ActuatorParams =
            serde_json::from_str(r#"{ "mode": "multi_turn", "pins": { "tx": 7, "rx": 8 } }"#)
                .unwrap();
        assert_eq!(params.mode, DynamixelMode::MultiTurn);
        assert_eq!(params.pins, SerialPins { tx: 7, rx: 8 });
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = ControllerConfig::load(Path::new("/nonexistent/dynamixel.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_speed_words_cover_both_directions() {
        assert_eq!(DYNA_SPEED_CCW_MAX + 1, DYNA_SPEED_CW_MIN);
        assert_eq!(SPEED_MIN, -SPEED_MAX);
    }
}
