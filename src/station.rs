//! Command dispatcher for the binary board protocol.
//!
//! [`Station`] composes the command encoder, the address translator,
//! the frame codec and the transport session into one typed call per
//! operation. Every operation resolves to a [`CommandOutcome`]: a
//! device that answers with a nonzero status produced a value, not an
//! error.

use crate::command::{is_known_opcode, Command};
use crate::constants::*;
use crate::error::{Result, StationError};
use crate::frame;
use crate::mapping::{led_slot_index, map_board_to_slot, map_slot_to_board};
use crate::session::{Session, SessionConfig};
use crate::stream::{ByteStream, SerialStream};
use crate::types::*;
use chrono::Utc;
use std::time::Instant;

/// Main interface to a chain of station boards speaking the binary
/// protocol.
pub struct Station<S: ByteStream> {
    session: Session<S>,
}

impl Station<SerialStream> {
    /// Open the serial port and create a station interface.
    pub fn open(port_name: &str) -> Result<Self> {
        let stream = SerialStream::open(port_name, BAUD_RATE)?;
        log::info!("connected to {port_name} at {BAUD_RATE} baud");
        Ok(Station {
            session: Session::new(stream, SessionConfig::binary()),
        })
    }

    /// List available serial ports.
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        SerialStream::list_ports()
    }
}

impl<S: ByteStream> Station<S> {
    /// Create a station over an already-open byte stream.
    pub fn with_stream(stream: S) -> Self {
        Station {
            session: Session::new(stream, SessionConfig::binary()),
        }
    }

    /// Close the underlying session.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    /// Execute one command against one board and return the raw typed
    /// response.
    pub fn execute(&mut self, board_address: u8, command: &Command) -> Result<CommandResponse> {
        let interior = command.encode_for_board(board_address)?;
        let wire = frame::build_frame(&interior);

        let raw = self.session.send_frame(&wire)?;
        let reply = frame::parse_frame(&raw)?;

        if reply.len() < 2 {
            return Err(StationError::InvalidResponse(format!(
                "response too short: {} bytes",
                reply.len()
            )));
        }

        let msg_type = reply[0];
        if !is_known_opcode(msg_type) {
            // Fail closed rather than guessing a payload layout.
            return Err(StationError::UnsupportedCommand { opcode: msg_type });
        }

        let status = reply[1];
        if status != STATUS_OK {
            log::debug!(
                "board {board_address} opcode {:#04x}: {}",
                msg_type,
                DeviceStatus::from_code(status).message()
            );
        }

        Ok(CommandResponse {
            msg_type,
            status,
            success: status == STATUS_OK,
            data: reply[2..].to_vec(),
        })
    }

    /// Query the powerbank held by one slot.
    pub fn status(&mut self, board_address: u8, slot: u8) -> Result<CommandOutcome<PowerbankInfo>> {
        let response = self.execute(board_address, &Command::Status { slot })?;
        let payload = if response.success {
            Some(decode_powerbank_info(&response.data)?)
        } else {
            None
        };
        Ok(outcome(&response, payload))
    }

    /// Query fill/lock state of all six slots on one board.
    pub fn slots(&mut self, board_address: u8) -> Result<CommandOutcome<SlotsInfo>> {
        let response = self.execute(board_address, &Command::Slots)?;
        let payload = if response.success {
            Some(decode_slots_info(&response.data)?)
        } else {
            None
        };
        Ok(outcome(&response, payload))
    }

    /// Query the board model string and chain length.
    pub fn model(&mut self, board_address: u8) -> Result<CommandOutcome<ModelInfo>> {
        let response = self.execute(board_address, &Command::Model)?;
        let payload = if response.success {
            Some(decode_model_info(&response.data)?)
        } else {
            None
        };
        Ok(outcome(&response, payload))
    }

    /// Query the firmware version.
    pub fn firmware_version(&mut self, board_address: u8) -> Result<CommandOutcome<String>> {
        let response = self.execute(board_address, &Command::FirmwareVersion)?;
        let payload = if response.success {
            Some(decode_firmware_version(&response.data)?)
        } else {
            None
        };
        Ok(outcome(&response, payload))
    }

    /// Unlock a slot addressed by its flat index (1-30).
    pub fn unlock(&mut self, slot_index: u8) -> Result<CommandOutcome<()>> {
        let m = map_slot_to_board(slot_index)?;
        let response = self.execute(
            m.board_address,
            &Command::Unlock {
                slot: m.slot_in_board,
            },
        )?;
        Ok(outcome(&response, response.success.then_some(())))
    }

    /// Enable or disable charging for a slot addressed by its flat
    /// index (1-30).
    pub fn charge(&mut self, slot_index: u8, enable: bool) -> Result<CommandOutcome<()>> {
        let m = map_slot_to_board(slot_index)?;
        let response = self.execute(
            m.board_address,
            &Command::SetCharge {
                slot: m.slot_in_board,
                enable,
            },
        )?;
        Ok(outcome(&response, response.success.then_some(())))
    }

    /// Set the LED for a slot addressed by its flat index (1-30).
    ///
    /// The LED controller counts slots in reverse; the inversion is
    /// applied here and nowhere else.
    pub fn led(&mut self, slot_index: u8, on: bool) -> Result<CommandOutcome<()>> {
        let m = map_slot_to_board(slot_index)?;
        let response = self.execute(
            m.board_address,
            &Command::SetLed {
                slot: led_slot_index(m.slot_in_board),
                on,
            },
        )?;
        Ok(outcome(&response, response.success.then_some(())))
    }

    /// Reset one slot.
    pub fn reset(&mut self, board_address: u8, slot: u8) -> Result<CommandOutcome<()>> {
        let response = self.execute(board_address, &Command::Reset { slot })?;
        Ok(outcome(&response, response.success.then_some(())))
    }

    /// Set the USB-PD power data object for one slot.
    pub fn set_pdo(
        &mut self,
        board_address: u8,
        slot: u8,
        voltage: u8,
        current: u8,
    ) -> Result<CommandOutcome<()>> {
        let response = self.execute(
            board_address,
            &Command::SetPdo {
                slot,
                voltage,
                current,
            },
        )?;
        Ok(outcome(&response, response.success.then_some(())))
    }

    /// Write a powerbank's manufacturing and battery records in two
    /// steps (opcodes 0x08 then 0x09).
    ///
    /// The battery record is only written when the board accepted the
    /// manufacturing record.
    pub fn initialize_powerbank(
        &mut self,
        board_address: u8,
        slot: u8,
        params: &PowerbankParams,
    ) -> Result<CommandOutcome<()>> {
        let timestamp = params
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp().max(0) as u32);

        let info = self.execute(
            board_address,
            &Command::SetPowerbankInfo {
                slot,
                serial: params.serial.clone(),
                timestamp,
                cycles: params.cycles.unwrap_or(0),
            },
        )?;
        if !info.success {
            return Ok(outcome(&info, None));
        }

        let battery = self.execute(
            board_address,
            &Command::SetBatteryInfo {
                slot,
                total_charge: params.total_charge.unwrap_or(13925),
                current_charge: params.current_charge.unwrap_or(11625),
                cutoff_charge: params.cutoff_charge.unwrap_or(10625),
            },
        )?;
        Ok(outcome(&battery, battery.success.then_some(())))
    }

    /// Scan every board and slot: occupancy, powerbank status, LEDs,
    /// and charging selection.
    ///
    /// At most one slot per board gets charging enabled (the first
    /// occupied slot below full charge, in ascending slot order); every
    /// other occupied slot on that board gets charging explicitly
    /// disabled. This exclusivity is a hardware power-budget limit. A
    /// slot whose status query fails is recorded and skipped for
    /// charging selection; a board whose slots query fails is recorded
    /// and skipped entirely. The scan never aborts over one failure.
    pub fn scan(&mut self, max_board_address: u8) -> Result<ScanReport> {
        if max_board_address > MAXIMUM_BOARD_ADDRESS {
            return Err(StationError::BoardAddressOutOfRange {
                board: max_board_address,
                max: MAXIMUM_BOARD_ADDRESS,
            });
        }

        let started = Instant::now();
        let mut slots = Vec::new();
        let mut errors = Vec::new();

        for board in 0..=max_board_address {
            self.scan_board(board, &mut slots, &mut errors);
        }

        Ok(ScanReport {
            slots,
            errors,
            execution_time_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        })
    }

    fn scan_board(&mut self, board: u8, slots: &mut Vec<SlotEntry>, errors: &mut Vec<ScanError>) {
        let info = match self.slots(board) {
            Ok(o) if o.success => match o.payload {
                Some(info) => info,
                None => return,
            },
            Ok(o) => {
                errors.push(ScanError {
                    index: None,
                    board_address: board,
                    slot_in_board: None,
                    kind: ScanErrorKind::SlotsCommandFailed,
                    message: DeviceStatus::from_code(o.status).message(),
                });
                return;
            }
            Err(e) => {
                errors.push(ScanError {
                    index: None,
                    board_address: board,
                    slot_in_board: None,
                    kind: ScanErrorKind::ConnectionError,
                    message: e.to_string(),
                });
                return;
            }
        };

        // Per-slot status for occupied slots; failures leave a None.
        let mut readings: [Option<PowerbankInfo>; 6] = Default::default();
        let mut occupied = [false; 6];

        for slot in 0..SLOTS_PER_BOARD {
            let idx = slot as usize;
            // A cleared lock bit (SLOT_LOCKED) means a powerbank is
            // locked in place in that slot.
            occupied[idx] = !info.locked[idx];
            if !occupied[idx] {
                continue;
            }

            // A flat index always exists here: board and slot were both
            // range-checked above.
            let flat = match map_board_to_slot(board, slot) {
                Ok(flat) => flat,
                Err(_) => continue,
            };

            if let Err(e) = self.led(flat, true) {
                log::warn!("LED on slot {flat} failed: {e}");
            }

            match self.status(board, slot) {
                Ok(o) if o.success => readings[idx] = o.payload,
                Ok(o) => errors.push(ScanError {
                    index: Some(flat),
                    board_address: board,
                    slot_in_board: Some(slot),
                    kind: ScanErrorKind::StatusCommandFailed,
                    message: DeviceStatus::from_code(o.status).message(),
                }),
                Err(e) => errors.push(ScanError {
                    index: Some(flat),
                    board_address: board,
                    slot_in_board: Some(slot),
                    kind: ScanErrorKind::ConnectionError,
                    message: e.to_string(),
                }),
            }
        }

        // First occupied slot below full charge wins the board's one
        // charging budget.
        let charge_target = (0..6usize).find(|&i| {
            readings[i]
                .as_ref()
                .map(|r| power_level(r.current_charge, r.total_charge) < MAXIMUM_POWER_LEVEL)
                .unwrap_or(false)
        });

        for slot in 0..SLOTS_PER_BOARD {
            let idx = slot as usize;
            let flat = match map_board_to_slot(board, slot) {
                Ok(flat) => flat,
                Err(_) => continue,
            };

            let mut charging = false;
            if occupied[idx] {
                let enable = charge_target == Some(idx);
                match self.charge(flat, enable) {
                    Ok(o) => charging = enable && o.success,
                    Err(e) => {
                        log::warn!("charge command for slot {flat} failed: {e}");
                        errors.push(ScanError {
                            index: Some(flat),
                            board_address: board,
                            slot_in_board: Some(slot),
                            kind: ScanErrorKind::ConnectionError,
                            message: e.to_string(),
                        });
                    }
                }
            }

            let powerbank = readings[idx].as_ref().map(|r| PowerbankSummary {
                id: r.serial.clone(),
                power_level: power_level(r.current_charge, r.total_charge),
            });

            slots.push(SlotEntry {
                index: flat,
                board_address: board,
                slot_in_board: slot,
                state: if powerbank.is_some() {
                    SlotState::Available
                } else if occupied[idx] {
                    SlotState::Unknown
                } else {
                    SlotState::Empty
                },
                powerbank,
                charging,
                locked: occupied[idx],
            });
        }
    }
}

/// Power level percentage from current and total charge, truncated.
pub fn power_level(current_charge: u16, total_charge: u16) -> u8 {
    if total_charge == 0 {
        return 0;
    }
    ((current_charge as u32 * 100) / total_charge as u32).min(100) as u8
}

fn outcome<T>(response: &CommandResponse, payload: Option<T>) -> CommandOutcome<T> {
    CommandOutcome {
        success: response.success,
        status: response.status,
        payload,
    }
}

/// Trimmed, NUL-stripped fixed-width ASCII.
fn decode_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn decode_powerbank_info(data: &[u8]) -> Result<PowerbankInfo> {
    if data.len() < 23 {
        return Err(StationError::InvalidResponse(format!(
            "status payload too short: {} bytes",
            data.len()
        )));
    }

    Ok(PowerbankInfo {
        serial: decode_ascii(&data[0..10]),
        timestamp: u32::from_le_bytes([data[10], data[11], data[12], data[13]]),
        total_charge: u16::from_le_bytes([data[14], data[15]]),
        current_charge: u16::from_le_bytes([data[16], data[17]]),
        cutoff_charge: u16::from_le_bytes([data[18], data[19]]),
        cycles: u16::from_le_bytes([data[20], data[21]]),
        status: data[22],
    })
}

/// Three numeric version bytes rendered as `major.minor.patch`.
fn decode_firmware_version(data: &[u8]) -> Result<String> {
    if data.len() < 3 {
        return Err(StationError::InvalidResponse(format!(
            "firmware payload too short: {} bytes",
            data.len()
        )));
    }
    Ok(format!("{}.{}.{}", data[0], data[1], data[2]))
}

fn decode_slots_info(data: &[u8]) -> Result<SlotsInfo> {
    if data.len() < 2 {
        return Err(StationError::InvalidResponse(format!(
            "slots payload too short: {} bytes",
            data.len()
        )));
    }

    let fill = data[0];
    let lock = data[1];
    let mut filled = [false; 6];
    let mut locked = [false; 6];
    for i in 0..6 {
        filled[i] = (fill >> i) & 1 == 1;
        locked[i] = (lock >> i) & 1 == 1;
    }

    Ok(SlotsInfo { filled, locked })
}

fn decode_model_info(data: &[u8]) -> Result<ModelInfo> {
    if data.len() < 9 {
        return Err(StationError::InvalidResponse(format!(
            "model payload too short: {} bytes",
            data.len()
        )));
    }

    Ok(ModelInfo {
        model: decode_ascii(&data[0..8]),
        board_count: data[8],
    })
}
