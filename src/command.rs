//! Command encoding for the binary protocol.
//!
//! Each opcode is one variant of a closed [`Command`] enum; encoding is
//! a single exhaustive match, so every opcode provably has both a
//! validator and an encoder. Validation happens here, before any I/O.
//!
//! Every opcode has a fixed payload width; the same logical command
//! always yields the same bytes.

use crate::constants::*;
use crate::error::{Result, StationError};

/// One logical board command, tagged by opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Query powerbank status for one slot (0x01)
    Status {
        /// Board-local slot index (0-5)
        slot: u8,
    },
    /// Enable or disable charging for one slot (0x02)
    SetCharge { slot: u8, enable: bool },
    /// Reset one slot (0x03)
    Reset { slot: u8 },
    /// Set the USB-PD power data object for one slot (0x04)
    SetPdo { slot: u8, voltage: u8, current: u8 },
    /// Query fill/lock state of all slots on the board (0x05)
    Slots,
    /// Unlock one slot (0x06)
    Unlock { slot: u8 },
    /// Set the LED state for one slot (0x07)
    SetLed { slot: u8, on: bool },
    /// Write powerbank manufacturing info (0x08)
    SetPowerbankInfo {
        slot: u8,
        /// Exactly 10 ASCII characters
        serial: String,
        /// Manufacturing timestamp, seconds since epoch
        timestamp: u32,
        /// Charge cycle count
        cycles: u16,
    },
    /// Write powerbank battery charge info, all fields in mAh (0x09)
    SetBatteryInfo {
        slot: u8,
        total_charge: u16,
        current_charge: u16,
        cutoff_charge: u16,
    },
    /// Query board model string and board count (0x0A)
    Model,
    /// Query firmware version (0x50)
    FirmwareVersion,
}

impl Command {
    /// The wire opcode for this command.
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Status { .. } => CMD_STATUS,
            Command::SetCharge { .. } => CMD_SET_CHARGE,
            Command::Reset { .. } => CMD_RESET,
            Command::SetPdo { .. } => CMD_SET_PDO,
            Command::Slots => CMD_SLOTS,
            Command::Unlock { .. } => CMD_UNLOCK,
            Command::SetLed { .. } => CMD_SET_LED,
            Command::SetPowerbankInfo { .. } => CMD_SET_INFO_POWERBANK,
            Command::SetBatteryInfo { .. } => CMD_SET_INFO_BATTERY,
            Command::Model => CMD_MODEL,
            Command::FirmwareVersion => CMD_GET_FW_VER,
        }
    }

    /// Encode the opcode + argument payload.
    ///
    /// Fails with [`StationError::SlotOutOfRange`] or
    /// [`StationError::InvalidArgumentLength`] before a single byte is
    /// written to the bus.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Command::Status { slot }
            | Command::Reset { slot }
            | Command::Unlock { slot } => {
                check_slot(*slot)?;
                Ok(vec![self.opcode(), *slot])
            }
            Command::SetCharge { slot, enable } => {
                check_slot(*slot)?;
                Ok(vec![self.opcode(), *slot, *enable as u8])
            }
            Command::SetLed { slot, on } => {
                check_slot(*slot)?;
                Ok(vec![self.opcode(), *slot, *on as u8])
            }
            Command::SetPdo {
                slot,
                voltage,
                current,
            } => {
                check_slot(*slot)?;
                Ok(vec![self.opcode(), *slot, *voltage, *current])
            }
            Command::Slots | Command::Model | Command::FirmwareVersion => {
                Ok(vec![self.opcode()])
            }
            Command::SetPowerbankInfo {
                slot,
                serial,
                timestamp,
                cycles,
            } => {
                check_slot(*slot)?;
                if serial.len() != SERIAL_NUMBER_LEN {
                    return Err(StationError::InvalidArgumentLength {
                        what: "serial number",
                        expected: SERIAL_NUMBER_LEN,
                        actual: serial.len(),
                    });
                }
                // opcode + slot + serial(10) + timestamp(4) + cycles(2)
                let mut payload = Vec::with_capacity(18);
                payload.push(self.opcode());
                payload.push(*slot);
                payload.extend_from_slice(serial.as_bytes());
                payload.extend_from_slice(&timestamp.to_le_bytes());
                payload.extend_from_slice(&cycles.to_le_bytes());
                Ok(payload)
            }
            Command::SetBatteryInfo {
                slot,
                total_charge,
                current_charge,
                cutoff_charge,
            } => {
                check_slot(*slot)?;
                let mut payload = Vec::with_capacity(8);
                payload.push(self.opcode());
                payload.push(*slot);
                payload.extend_from_slice(&total_charge.to_le_bytes());
                payload.extend_from_slice(&current_charge.to_le_bytes());
                payload.extend_from_slice(&cutoff_charge.to_le_bytes());
                Ok(payload)
            }
        }
    }

    /// Encode opcode + payload prefixed by the target board address,
    /// producing the frame interior the codec wraps.
    pub fn encode_for_board(&self, board_address: u8) -> Result<Vec<u8>> {
        if board_address > MAXIMUM_BOARD_ADDRESS {
            return Err(StationError::BoardAddressOutOfRange {
                board: board_address,
                max: MAXIMUM_BOARD_ADDRESS,
            });
        }
        let mut interior = vec![board_address];
        interior.extend(self.encode()?);
        Ok(interior)
    }
}

fn check_slot(slot: u8) -> Result<()> {
    if slot > MAXIMUM_SLOT_ADDRESS {
        return Err(StationError::SlotOutOfRange {
            slot,
            max: MAXIMUM_SLOT_ADDRESS,
        });
    }
    Ok(())
}

/// True when the opcode is one this library knows how to decode.
pub fn is_known_opcode(opcode: u8) -> bool {
    matches!(
        opcode,
        CMD_STATUS
            | CMD_SET_CHARGE
            | CMD_RESET
            | CMD_SET_PDO
            | CMD_SLOTS
            | CMD_UNLOCK
            | CMD_SET_LED
            | CMD_SET_INFO_POWERBANK
            | CMD_SET_INFO_BATTERY
            | CMD_MODEL
            | CMD_GET_FW_VER
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_commands() {
        assert_eq!(Command::Status { slot: 3 }.encode().unwrap(), vec![0x01, 3]);
        assert_eq!(Command::Unlock { slot: 0 }.encode().unwrap(), vec![0x06, 0]);
        assert_eq!(Command::Reset { slot: 5 }.encode().unwrap(), vec![0x03, 5]);
    }

    #[test]
    fn flag_commands() {
        assert_eq!(
            Command::SetCharge {
                slot: 2,
                enable: true
            }
            .encode()
            .unwrap(),
            vec![0x02, 2, 1]
        );
        assert_eq!(
            Command::SetLed { slot: 4, on: false }.encode().unwrap(),
            vec![0x07, 4, 0]
        );
    }

    #[test]
    fn parameterless_commands() {
        assert_eq!(Command::Slots.encode().unwrap(), vec![0x05]);
        assert_eq!(Command::Model.encode().unwrap(), vec![0x0A]);
        assert_eq!(Command::FirmwareVersion.encode().unwrap(), vec![0x50]);
    }

    #[test]
    fn set_powerbank_info_layout() {
        let cmd = Command::SetPowerbankInfo {
            slot: 1,
            serial: "SN00000042".to_string(),
            timestamp: 0x0102_0304,
            cycles: 7,
        };
        let payload = cmd.encode().unwrap();
        assert_eq!(payload.len(), 18);
        assert_eq!(payload[0], 0x08);
        assert_eq!(payload[1], 1);
        assert_eq!(&payload[2..12], b"SN00000042");
        assert_eq!(&payload[12..16], &[0x04, 0x03, 0x02, 0x01]); // LE
        assert_eq!(&payload[16..18], &[7, 0]);
    }

    #[test]
    fn set_battery_info_layout() {
        let cmd = Command::SetBatteryInfo {
            slot: 0,
            total_charge: 13925,
            current_charge: 11625,
            cutoff_charge: 10625,
        };
        let payload = cmd.encode().unwrap();
        assert_eq!(payload.len(), 8);
        assert_eq!(payload[0], 0x09);
        assert_eq!(u16::from_le_bytes([payload[2], payload[3]]), 13925);
        assert_eq!(u16::from_le_bytes([payload[4], payload[5]]), 11625);
        assert_eq!(u16::from_le_bytes([payload[6], payload[7]]), 10625);
    }

    #[test]
    fn rejects_bad_slot_before_io() {
        assert!(matches!(
            Command::Status { slot: 6 }.encode(),
            Err(StationError::SlotOutOfRange { slot: 6, .. })
        ));
    }

    #[test]
    fn rejects_bad_serial_length() {
        let cmd = Command::SetPowerbankInfo {
            slot: 0,
            serial: "SHORT".to_string(),
            timestamp: 0,
            cycles: 0,
        };
        assert!(matches!(
            cmd.encode(),
            Err(StationError::InvalidArgumentLength {
                expected: 10,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn board_prefix_and_range() {
        let interior = Command::Slots.encode_for_board(2).unwrap();
        assert_eq!(interior, vec![2, 0x05]);
        assert!(matches!(
            Command::Slots.encode_for_board(5),
            Err(StationError::BoardAddressOutOfRange { board: 5, .. })
        ));
    }

    #[test]
    fn encoding_is_deterministic() {
        let cmd = Command::SetPdo {
            slot: 1,
            voltage: 9,
            current: 2,
        };
        assert_eq!(cmd.encode().unwrap(), cmd.encode().unwrap());
    }
}
