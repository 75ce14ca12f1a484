//! ASCII bracket codec for the legacy board family.
//!
//! Requests look like `{<addr>@<CMD>,<field>,<field>,...}` and are
//! terminated with CR LF on the wire (appended by the session, not
//! here). There is no checksum; absence of a parse failure is the
//! success signal.
//!
//! The boards answer a `CQ` query with an `AC` (active report) frame:
//!
//! ```text
//! {<addr>@AC,<messageId>,<deviceId>,<fwVersion>,<slotCount>,
//!  <status1>,<status2>,<status3>,<slot1>,...,<slotN>[checksum]}
//! ```
//!
//! where each slot field is `slotNumber:fillStatus:serialOrNULL:powerLevel:status`.
//! The optional trailing 4-hex-digit checksum is extracted but never
//! verified; no checksum algorithm has been confirmed for it, and
//! rejecting legitimate frames over an invented one would be worse
//! than ignoring it.

use crate::error::FrameError;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Reply command mnemonic for an active report.
pub const CMD_ACTIVE_REPORT: &str = "AC";
/// Query mnemonic.
pub const CMD_QUERY: &str = "CQ";
/// Unlock mnemonic.
pub const CMD_UNLOCK_SLOT: &str = "FB";

/// A parsed ASCII envelope: address segment plus command-and-fields
/// segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Board id segment before the `@`
    pub address: String,
    /// Two-letter command mnemonic
    pub command: String,
    /// Comma-separated fields after the mnemonic
    pub fields: Vec<String>,
}

/// Build a request frame (without the trailing CR LF).
pub fn build_request(address: u8, command: &str, fields: &[&str]) -> String {
    if fields.is_empty() {
        format!("{{{address}@{command}}}")
    } else {
        format!("{{{address}@{command},{}}}", fields.join(","))
    }
}

/// Parse a complete `{...}` frame into its envelope parts.
///
/// Fails with [`FrameError::MalformedEnvelope`] when the delimiters are
/// missing or the interior does not split into exactly an address
/// segment and a command-and-fields segment.
pub fn parse_envelope(frame: &str) -> Result<Envelope, FrameError> {
    let frame = frame.trim();
    let interior = frame
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or(FrameError::MalformedEnvelope)?;

    let mut parts = interior.split('@');
    let (address, rest) = match (parts.next(), parts.next(), parts.next()) {
        (Some(addr), Some(rest), None) => (addr, rest),
        _ => return Err(FrameError::MalformedEnvelope),
    };

    let mut fields = rest.split(',');
    let command = fields.next().ok_or(FrameError::MalformedEnvelope)?;
    if command.is_empty() {
        return Err(FrameError::MalformedEnvelope);
    }

    Ok(Envelope {
        address: address.to_string(),
        command: command.to_string(),
        fields: fields.map(str::to_string).collect(),
    })
}

/// One slot entry of an active report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotReading {
    /// 1-based slot number on the board
    pub slot_number: u8,
    /// 0 = empty, 1 = filled
    pub fill_status: u8,
    /// Powerbank serial, `None` when the device reports `NULL`
    pub serial_number: Option<String>,
    /// Battery power level (0-100)
    pub power_level: u8,
    /// Raw three-digit status field
    pub status: String,
}

/// Standardized slot state decoded from the three status digits.
///
/// Digit layout `ABC`: A = charging bit, B = contact (0 = in contact),
/// C = lock (1 = lock in place).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatusFlags {
    /// Powerbank in contact, locked in place, serial present
    pub available: bool,
    /// Currently charging
    pub charging: bool,
    /// Available and discharging into a load
    pub outputting: bool,
}

impl SlotReading {
    /// Decode the status digits into standardized flags.
    pub fn flags(&self) -> SlotStatusFlags {
        let digits: Vec<char> = self.status.chars().collect();
        if digits.len() < 3 {
            return SlotStatusFlags {
                available: false,
                charging: false,
                outputting: false,
            };
        }

        let charging = digits[0] == '1';
        let in_contact = digits[1] == '0';
        let locked = digits[2] == '1';
        let available = in_contact && locked && self.serial_number.is_some();

        SlotStatusFlags {
            available,
            charging,
            outputting: available && !charging && self.serial_number.is_some(),
        }
    }
}

/// A fully parsed active report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveReport {
    pub message_id: String,
    pub device_id: String,
    pub firmware_version: String,
    pub slot_count: u8,
    pub status1: u8,
    pub status2: u8,
    pub status3: u8,
    pub slots: Vec<SlotReading>,
    /// Trailing 4-hex-digit checksum, informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ActiveReport {
    /// Parse the fields of an `AC` envelope.
    ///
    /// Returns `None` when fewer than the seven header fields are
    /// present or nothing parses.
    pub fn parse(fields: &[String]) -> Option<ActiveReport> {
        let mut joined = fields.join(",");

        // Peel off the informational trailing checksum when the last
        // four characters are all hex digits.
        let checksum = if joined.len() >= 4
            && joined
                .chars()
                .rev()
                .take(4)
                .all(|c| c.is_ascii_hexdigit())
        {
            let tail = joined.split_off(joined.len() - 4);
            joined.truncate(joined.trim_end().len());
            Some(tail)
        } else {
            None
        };

        let parts: Vec<&str> = joined.split(',').collect();
        if parts.len() < 7 {
            return None;
        }

        let slots = parts[7..]
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| parse_slot_field(s))
            .collect();

        Some(ActiveReport {
            message_id: parts[0].to_string(),
            device_id: parts[1].to_string(),
            firmware_version: parts[2].to_string(),
            slot_count: parts[3].parse().unwrap_or(0),
            status1: parts[4].parse().unwrap_or(0),
            status2: parts[5].parse().unwrap_or(0),
            status3: parts[6].parse().unwrap_or(0),
            slots,
            checksum,
        })
    }
}

fn parse_slot_field(field: &str) -> Option<SlotReading> {
    let parts: Vec<&str> = field.split(':').collect();
    if parts.len() < 5 {
        return None;
    }

    Some(SlotReading {
        slot_number: parts[0].parse().unwrap_or(0),
        fill_status: parts[1].parse().unwrap_or(0),
        serial_number: match parts[2] {
            "" | "NULL" => None,
            s => Some(s.to_string()),
        },
        power_level: parts[3].parse().unwrap_or(0),
        status: parts[4].to_string(),
    })
}

/// Monotonic millisecond nonce for the legacy unlock command.
///
/// The boards de-duplicate unlock requests by requiring a strictly
/// increasing value; two unlocks issued within the same millisecond
/// would otherwise collide. Owned and injectable, one per process.
#[derive(Debug, Default)]
pub struct UnlockNonce {
    last_issued: u64,
}

impl UnlockNonce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next nonce: wall-clock milliseconds, forced to `last + 1` when
    /// the clock has not advanced past the last issued value.
    pub fn next(&mut self) -> u64 {
        self.next_from(Utc::now().timestamp_millis().max(0) as u64)
    }

    fn next_from(&mut self, now_ms: u64) -> u64 {
        let nonce = if now_ms <= self.last_issued {
            self.last_issued + 1
        } else {
            now_ms
        };
        self.last_issued = nonce;
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_requests() {
        assert_eq!(build_request(0, CMD_QUERY, &["0", "0", "0000"]), "{0@CQ,0,0,0000}");
        assert_eq!(
            build_request(0, CMD_UNLOCK_SLOT, &["0", "1699999999999", "3", "0000"]),
            "{0@FB,0,1699999999999,3,0000}"
        );
    }

    #[test]
    fn parses_envelope() {
        let env = parse_envelope("{0@AC,1,DEV001}").unwrap();
        assert_eq!(env.address, "0");
        assert_eq!(env.command, "AC");
        assert_eq!(env.fields, vec!["1", "DEV001"]);
    }

    #[test]
    fn malformed_envelopes() {
        assert_eq!(parse_envelope("0@AC,1}"), Err(FrameError::MalformedEnvelope));
        assert_eq!(parse_envelope("{0@AC@1}"), Err(FrameError::MalformedEnvelope));
        assert_eq!(parse_envelope("{0,AC,1}"), Err(FrameError::MalformedEnvelope));
    }

    #[test]
    fn parses_active_report() {
        let env =
            parse_envelope("{0@AC,1,DEV001,1.0.0,6,0,0,0,1:1:SN0000001:85:001}").unwrap();
        assert_eq!(env.command, CMD_ACTIVE_REPORT);
        let report = ActiveReport::parse(&env.fields).unwrap();
        assert_eq!(report.device_id, "DEV001");
        assert_eq!(report.firmware_version, "1.0.0");
        assert_eq!(report.slot_count, 6);
        assert_eq!(report.slots.len(), 1);

        let slot = &report.slots[0];
        assert_eq!(slot.serial_number.as_deref(), Some("SN0000001"));
        assert_eq!(slot.power_level, 85);

        // "001": charging=0, contact=0 (in contact), lock=1 (in place)
        let flags = slot.flags();
        assert!(!flags.charging);
        assert!(flags.available);
        assert!(flags.outputting);
    }

    #[test]
    fn null_serial_and_empty_slot() {
        let env = parse_envelope("{0@AC,1,DEV001,1.0.0,6,0,0,0,2:0:NULL:0:000}").unwrap();
        let report = ActiveReport::parse(&env.fields).unwrap();
        let slot = &report.slots[0];
        assert_eq!(slot.serial_number, None);
        let flags = slot.flags();
        assert!(!flags.available);
        assert!(!flags.outputting);
    }

    #[test]
    fn extracts_unverified_checksum() {
        let fields: Vec<String> = ["1", "DEV001", "1.0.0", "6", "0", "0", "0", "3ea0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = ActiveReport::parse(&fields).unwrap();
        assert_eq!(report.checksum.as_deref(), Some("3ea0"));
    }

    #[test]
    fn too_few_fields_is_none() {
        let fields: Vec<String> = ["1", "DEV001"].iter().map(|s| s.to_string()).collect();
        assert!(ActiveReport::parse(&fields).is_none());
    }

    #[test]
    fn nonce_is_strictly_increasing() {
        let mut nonce = UnlockNonce::new();
        let a = nonce.next_from(1000);
        let b = nonce.next_from(1000); // same millisecond
        let c = nonce.next_from(999); // clock went backwards
        let d = nonce.next_from(2000);
        assert_eq!(a, 1000);
        assert_eq!(b, 1001);
        assert_eq!(c, 1002);
        assert_eq!(d, 2000);
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn nonce_wall_clock() {
        let mut nonce = UnlockNonce::new();
        let a = nonce.next();
        let b = nonce.next();
        assert!(b > a);
    }
}
