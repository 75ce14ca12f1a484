//! Typed results returned by the command dispatcher.

use crate::constants::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw outcome of one executed command.
///
/// A nonzero device status is a normal result, not a transport error:
/// the bus worked, the board said no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// Opcode echoed by the board
    pub msg_type: u8,
    /// Raw device status byte (0x00 = OK)
    pub status: u8,
    /// True when the status byte is [`STATUS_OK`]
    pub success: bool,
    /// Trailing payload bytes after the status byte
    pub data: Vec<u8>,
}

/// Outcome of a typed operation: the raw status plus the decoded
/// payload when the device reported success and the payload parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome<T> {
    pub success: bool,
    /// Raw device status byte
    pub status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
}

/// Device status codes carried in the response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Ok,
    Timeout,
    InvalidCommand,
    InvalidArguments,
    InternalError,
    InvalidResponse,
    Unknown(u8),
}

impl DeviceStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            STATUS_OK => DeviceStatus::Ok,
            STATUS_TIMEOUT => DeviceStatus::Timeout,
            STATUS_ERR_INVALID_CMD => DeviceStatus::InvalidCommand,
            STATUS_ERR_INVALID_ARGS => DeviceStatus::InvalidArguments,
            STATUS_ERR_INTERNAL => DeviceStatus::InternalError,
            STATUS_ERR_INVALID_RESPONSE => DeviceStatus::InvalidResponse,
            other => DeviceStatus::Unknown(other),
        }
    }

    /// Human-readable description for logs and callers.
    pub fn message(&self) -> String {
        match self {
            DeviceStatus::Ok => "Command successful".to_string(),
            DeviceStatus::Timeout => "Device timeout - device not responding".to_string(),
            DeviceStatus::InvalidCommand => "Invalid command - command not supported".to_string(),
            DeviceStatus::InvalidArguments => {
                "Invalid arguments - check command parameters".to_string()
            }
            DeviceStatus::InternalError => {
                "Internal device error - device may need reset".to_string()
            }
            DeviceStatus::InvalidResponse => "Invalid response format from device".to_string(),
            DeviceStatus::Unknown(code) => format!("Unknown error (code: {code})"),
        }
    }
}

/// Powerbank record reported by a status query.
///
/// The library only moves these bytes; charge semantics beyond byte
/// offsets belong to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerbankInfo {
    /// Serial number, trimmed and NUL-stripped
    pub serial: String,
    /// Manufacturing timestamp, seconds since epoch
    pub timestamp: u32,
    /// Total charge in mAh
    pub total_charge: u16,
    /// Current charge in mAh
    pub current_charge: u16,
    /// Cutoff charge in mAh
    pub cutoff_charge: u16,
    /// Charge cycle count
    pub cycles: u16,
    /// Raw powerbank status code
    pub status: u8,
}

/// Fill/lock state of all six slots on one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotsInfo {
    /// Bit i set = slot i holds a powerbank
    pub filled: [bool; 6],
    /// Bit i set = slot i lock engaged
    pub locked: [bool; 6],
}

/// Board model query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// 8-character model string, trimmed
    pub model: String,
    /// Number of boards in the daisy chain
    pub board_count: u8,
}

/// Parameters for initializing a powerbank's on-device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerbankParams {
    /// Exactly 10 ASCII characters
    pub serial: String,
    /// Manufacturing timestamp; defaults to the current time
    pub timestamp: Option<u32>,
    /// Charge cycle count, defaults to 0
    pub cycles: Option<u16>,
    /// Total charge in mAh, defaults to 13925
    pub total_charge: Option<u16>,
    /// Current charge in mAh, defaults to 11625
    pub current_charge: Option<u16>,
    /// Cutoff charge in mAh, defaults to 10625
    pub cutoff_charge: Option<u16>,
}

/// Lifecycle state of a slot observed during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Empty,
    Unknown,
}

/// Summary of the powerbank occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerbankSummary {
    /// Powerbank serial number
    pub id: String,
    /// Power level percentage (0-100)
    pub power_level: u8,
}

/// One slot entry of a full station scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    /// Flat slot index (1-30)
    pub index: u8,
    pub board_address: u8,
    pub slot_in_board: u8,
    pub state: SlotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub powerbank: Option<PowerbankSummary>,
    /// True only for the one slot per board selected for charging
    pub charging: bool,
    pub locked: bool,
}

/// What went wrong for one slot or board during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    StatusCommandFailed,
    SlotsCommandFailed,
    InvalidResponse,
    ConnectionError,
}

/// One recorded scan failure; the scan continues past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    /// Flat slot index, or `None` for board-level failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u8>,
    pub board_address: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_in_board: Option<u8>,
    pub kind: ScanErrorKind,
    pub message: String,
}

/// Result of the aggregate all-slots scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub slots: Vec<SlotEntry>,
    pub errors: Vec<ScanError>,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}
