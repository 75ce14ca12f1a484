//! # Station Protocol Library
//!
//! A Rust library for controlling a daisy-chained fleet of powerbank
//! rental station boards over a half-duplex serial link. Each board
//! manages up to six slots holding rentable battery packs; the host
//! issues commands (status query, unlock, enable charging, set LED,
//! write manufacturing metadata) and the boards reply with a
//! fixed-layout response.
//!
//! Two independently evolved wire formats are supported:
//!
//! - the **binary framed protocol** (`0xEA` start marker, MODBUS CRC16
//!   integrity check), used by current boards (see [`Station`])
//! - the **ASCII bracket protocol** (`{0@CQ,...}` frames, no
//!   checksum), used by the legacy board family (see [`LegacyStation`])
//!
//! Both share the same correlation discipline: the bus carries one
//! command at a time, and the transport session turns the unreliable
//! byte stream into a reliable one-command-at-a-time RPC channel with
//! timeout and bounded retry.
//!
//! ## Example
//!
//! ```no_run
//! use station_protocol::Station;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut station = Station::open("/dev/ttyUSB0")?;
//!     let outcome = station.status(0, 0)?;
//!     if let Some(info) = outcome.payload {
//!         println!("Powerbank {} at {} mAh", info.serial, info.current_charge);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ascii;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod legacy;
pub mod mapping;
pub mod session;
pub mod station;
pub mod stream;
pub mod types;

pub use ascii::{ActiveReport, SlotReading, SlotStatusFlags, UnlockNonce};
pub use command::Command;
pub use error::{FrameError, Result, StationError};
pub use legacy::LegacyStation;
pub use mapping::{map_board_to_slot, map_slot_to_board, SlotMapping};
pub use session::{FrameBoundary, RequestToken, Session, SessionConfig};
pub use station::Station;
pub use stream::{ByteStream, SerialStream};
pub use types::*;
