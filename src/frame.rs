//! Binary frame codec.
//!
//! Frame structure on the wire:
//!
//! ```text
//! <SF> <address> <payload> <CRC16>
//! ```
//!
//! - SF: start-of-frame marker (0xEA)
//! - address: 1 byte board address
//! - payload: opcode plus arguments, variable length
//! - CRC16: MODBUS CRC16 of (address + payload), little-endian
//!
//! The marker is excluded from the CRC. Building and parsing are pure
//! and stateless; frame boundary detection lives in [`crate::session`].

use crate::constants::FRAME_START_BYTE;
use crate::error::FrameError;

/// MODBUS CRC16: init 0xFFFF, polynomial 0xA001, LSB first.
///
/// The boards require this exact variant bit-for-bit; any other CRC16
/// flavor silently desynchronizes every response.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Wrap an interior (address + payload) into a complete wire frame.
pub fn build_frame(interior: &[u8]) -> Vec<u8> {
    let crc = crc16(interior);
    log::trace!("calculated CRC16 {:#06x} over {} bytes", crc, interior.len());

    let mut frame = Vec::with_capacity(interior.len() + 3);
    frame.push(FRAME_START_BYTE);
    frame.extend_from_slice(interior);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Validate a complete wire frame and strip marker and CRC.
///
/// Returns the interior bytes (address + payload for requests, msgType +
/// status + payload for responses).
pub fn parse_frame(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    if frame.len() < 4 {
        return Err(FrameError::TooShort { len: frame.len() });
    }

    if frame[0] != FRAME_START_BYTE {
        return Err(FrameError::BadStartMarker { found: frame[0] });
    }

    let interior = &frame[1..frame.len() - 2];
    let received = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
    let calculated = crc16(interior);

    if received != calculated {
        log::debug!(
            "CRC mismatch: received {:#06x}, calculated {:#06x}",
            received,
            calculated
        );
        return Err(FrameError::ChecksumMismatch {
            received,
            calculated,
        });
    }

    Ok(interior.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_known_answers() {
        // Known-answer vectors for the MODBUS variant
        assert_eq!(crc16(&[]), 0xFFFF);
        assert_eq!(crc16(b"123456789"), 0x4B37);
        assert_eq!(crc16(&[0x01, 0x04, 0x02, 0xFF, 0xFF]), 0x80B8);
    }

    #[test]
    fn build_prepends_marker_and_appends_crc_le() {
        let frame = build_frame(&[0x00, 0x05]);
        assert_eq!(frame[0], FRAME_START_BYTE);
        assert_eq!(&frame[1..3], &[0x00, 0x05]);
        let crc = crc16(&[0x00, 0x05]);
        assert_eq!(frame[3], (crc & 0xFF) as u8);
        assert_eq!(frame[4], (crc >> 8) as u8);
    }

    #[test]
    fn round_trip() {
        let interior = [0x02, 0x01, 0x03, 0xAB, 0x00, 0xFF];
        let frame = build_frame(&interior);
        assert_eq!(parse_frame(&frame).unwrap(), interior.to_vec());
    }

    #[test]
    fn too_short() {
        assert_eq!(
            parse_frame(&[0xEA, 0x00, 0x01]),
            Err(FrameError::TooShort { len: 3 })
        );
    }

    #[test]
    fn bad_start_marker() {
        let mut frame = build_frame(&[0x00, 0x05]);
        frame[0] = 0xEB;
        assert_eq!(
            parse_frame(&frame),
            Err(FrameError::BadStartMarker { found: 0xEB })
        );
    }

    #[test]
    fn single_bit_corruption_detected() {
        let frame = build_frame(&[0x01, 0x02, 0x00, 0x42]);
        // Flip every bit of every interior and trailer byte in turn;
        // each corruption must be caught by the CRC.
        for byte in 1..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    matches!(
                        parse_frame(&corrupted),
                        Err(FrameError::ChecksumMismatch { .. })
                    ),
                    "bit {bit} of byte {byte} not detected"
                );
            }
        }
    }
}
