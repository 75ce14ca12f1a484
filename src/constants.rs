//! Protocol constants for powerbank station board communication.
//!
//! This module defines all the constants used by both wire protocols:
//! the binary framed protocol (current board family) and the ASCII
//! bracket protocol (legacy board family), including command codes,
//! timing parameters, and serial port configuration.

use std::time::Duration;

/// Start-of-frame marker for the binary protocol
pub const FRAME_START_BYTE: u8 = 0xEA;

/// Baud rate for the binary protocol (115200 bps)
pub const BAUD_RATE: u32 = 115_200;

/// Baud rate for the legacy ASCII protocol
pub const LEGACY_BAUD_RATE: u32 = 115_200;

/// Stop bits for the legacy ASCII protocol (2 stop bits required)
pub const LEGACY_STOP_BITS: serialport::StopBits = serialport::StopBits::Two;

/// Frame delimiters for the legacy ASCII protocol
pub const LEGACY_FRAME_START: u8 = b'{';
/// See [`LEGACY_FRAME_START`]
pub const LEGACY_FRAME_END: u8 = b'}';

// Command codes (binary protocol)

/// Query powerbank status for one slot
pub const CMD_STATUS: u8 = 0x01;
/// Enable/disable charging for one slot
pub const CMD_SET_CHARGE: u8 = 0x02;
/// Reset one slot
pub const CMD_RESET: u8 = 0x03;
/// Set USB-PD power data object for one slot
pub const CMD_SET_PDO: u8 = 0x04;
/// Query fill/lock state of all six slots on a board
pub const CMD_SLOTS: u8 = 0x05;
/// Unlock one slot
pub const CMD_UNLOCK: u8 = 0x06;
/// Set LED state for one slot
pub const CMD_SET_LED: u8 = 0x07;
/// Write powerbank manufacturing info (serial, timestamp, cycles)
pub const CMD_SET_INFO_POWERBANK: u8 = 0x08;
/// Write powerbank battery info (total/current/cutoff charge)
pub const CMD_SET_INFO_BATTERY: u8 = 0x09;
/// Query board model string and board count
pub const CMD_MODEL: u8 = 0x0A;
/// Query firmware version
pub const CMD_GET_FW_VER: u8 = 0x50;

// Device status codes

/// Command executed successfully
pub const STATUS_OK: u8 = 0x00;
/// Device-side timeout
pub const STATUS_TIMEOUT: u8 = 0x01;
/// Command not supported by the board
pub const STATUS_ERR_INVALID_CMD: u8 = 0x02;
/// Bad command arguments
pub const STATUS_ERR_INVALID_ARGS: u8 = 0x03;
/// Internal board error
pub const STATUS_ERR_INTERNAL: u8 = 0x04;
/// Board reported a malformed response
pub const STATUS_ERR_INVALID_RESPONSE: u8 = 0x80;

// Addressing limits

/// Highest addressable board in the daisy chain (boards 0..=4)
pub const MAXIMUM_BOARD_ADDRESS: u8 = 4;
/// Highest board-local slot index (slots 0..=5)
pub const MAXIMUM_SLOT_ADDRESS: u8 = 5;
/// Number of slots per board
pub const SLOTS_PER_BOARD: u8 = 6;
/// Lowest flat slot index
pub const SLOT_INDEX_MINIMUM: u8 = 1;
/// Highest flat slot index
pub const SLOT_INDEX_MAXIMUM: u8 = 30;
/// Lock byte value meaning the slot holds a locked powerbank
pub const SLOT_LOCKED: u8 = 0;

/// Maximum power level reported for a powerbank (percent)
pub const MAXIMUM_POWER_LEVEL: u8 = 100;

// Powerbank status codes reported in the status payload

/// Powerbank idle in slot
pub const PB_STATUS_IDLE: u8 = 1;
/// Powerbank plugged in, not yet charging
pub const PB_STATUS_PLUGGED_IN: u8 = 2;
/// Powerbank charging
pub const PB_STATUS_CHARGING: u8 = 3;
/// Powerbank discharging
pub const PB_STATUS_DISCHARGING: u8 = 4;
/// Powerbank at charge cutoff
pub const PB_STATUS_CUTOFF: u8 = 5;

// LED colors

pub const LED_COLOR_RED: u8 = 0;
pub const LED_COLOR_GREEN: u8 = 1;
pub const LED_COLOR_BLUE: u8 = 2;

// Timing

/// Response deadline per attempt, binary protocol
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Response deadline per attempt, legacy ASCII protocol
pub const LEGACY_RESPONSE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Inter-byte silence window that marks a binary frame as complete.
/// The boards stream bytes with no length prefix; 5ms of quiet means
/// the response is done.
pub const INTER_BYTE_SILENCE: Duration = Duration::from_millis(5);

/// Minimum idle time on the bus between two commands
pub const INTER_COMMAND_DELAY: Duration = Duration::from_millis(50);

/// Delay between retry attempts after a timeout or write failure
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Maximum attempts for one logical command
pub const MAX_RETRIES: u32 = 5;

/// Fixed length of a powerbank serial number on the wire
pub const SERIAL_NUMBER_LEN: usize = 10;
