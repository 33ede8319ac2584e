// Message types exchanged with the runtime over zenoh

use serde::{Deserialize, Serialize};

/// Signed speed on the controller's logical scale (SPEED_MIN..=SPEED_MAX)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MoveCommand {
    pub movement: i32,
}

/// Enables or disables output; disabling stops the servo
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PowerCommand {
    pub on: bool,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
