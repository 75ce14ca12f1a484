//! Command dispatcher for the legacy ASCII board family.
//!
//! These boards speak the bracket protocol: a `CQ` query answered by an
//! `AC` active report, and a fire-and-forget `FB` unlock carrying a
//! monotonic millisecond nonce. There is no checksum and no status
//! byte; a reply that parses is the success signal.

use crate::ascii::{
    build_request, parse_envelope, ActiveReport, UnlockNonce, CMD_ACTIVE_REPORT, CMD_QUERY,
    CMD_UNLOCK_SLOT,
};
use crate::constants::{LEGACY_BAUD_RATE, MAXIMUM_SLOT_ADDRESS};
use crate::error::{Result, StationError};
use crate::session::{Session, SessionConfig};
use crate::stream::{ByteStream, SerialStream};

/// Board id used on the single-board legacy chain.
const LEGACY_BOARD_ID: u8 = 0;

/// Interface to a legacy station board over the ASCII protocol.
pub struct LegacyStation<S: ByteStream> {
    session: Session<S>,
    nonce: UnlockNonce,
}

impl LegacyStation<SerialStream> {
    /// Open the serial port with the legacy configuration (2 stop
    /// bits) and create a station interface.
    pub fn open(port_name: &str) -> Result<Self> {
        let stream = SerialStream::open_legacy(port_name, LEGACY_BAUD_RATE)?;
        log::info!("connected to {port_name} at {LEGACY_BAUD_RATE} baud (legacy)");
        Ok(Self::with_stream_and_nonce(stream, UnlockNonce::new()))
    }
}

impl<S: ByteStream> LegacyStation<S> {
    /// Create a legacy station over an already-open byte stream with
    /// an injected nonce source.
    pub fn with_stream_and_nonce(stream: S, nonce: UnlockNonce) -> Self {
        LegacyStation {
            session: Session::new(stream, SessionConfig::legacy()),
            nonce,
        }
    }

    /// Close the underlying session.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
    }

    /// Query the board: sends `{0@CQ,0,0,0000}` and decodes the `AC`
    /// active report.
    pub fn query(&mut self) -> Result<ActiveReport> {
        let request = build_request(LEGACY_BOARD_ID, CMD_QUERY, &["0", "0", "0000"]);
        let reply = self.send(&request)?;

        let envelope = parse_envelope(&reply).map_err(StationError::Frame)?;
        if envelope.command != CMD_ACTIVE_REPORT {
            return Err(StationError::InvalidResponse(format!(
                "expected {CMD_ACTIVE_REPORT} reply, got {}",
                envelope.command
            )));
        }

        ActiveReport::parse(&envelope.fields).ok_or_else(|| {
            StationError::InvalidResponse("active report fields did not parse".to_string())
        })
    }

    /// Unlock a slot: sends `{0@FB,0,<nonce>,<slot>,0000}`.
    ///
    /// The board de-duplicates by the strictly increasing nonce and
    /// sends no reply; a clean write is the whole contract.
    pub fn unlock(&mut self, slot: u8) -> Result<()> {
        if slot > MAXIMUM_SLOT_ADDRESS {
            return Err(StationError::SlotOutOfRange {
                slot,
                max: MAXIMUM_SLOT_ADDRESS,
            });
        }

        let nonce = self.nonce.next();
        log::debug!("unlock slot {slot} with nonce {nonce}");
        let request = build_request(
            LEGACY_BOARD_ID,
            CMD_UNLOCK_SLOT,
            &["0", &nonce.to_string(), &slot.to_string(), "0000"],
        );

        let mut wire = request.into_bytes();
        wire.extend_from_slice(b"\r\n");
        self.session.send_frame_no_response(&wire)
    }

    fn send(&mut self, request: &str) -> Result<String> {
        let mut wire = request.as_bytes().to_vec();
        wire.extend_from_slice(b"\r\n");
        let reply = self.session.send_frame(&wire)?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::MockStream;

    impl LegacyStation<MockStream> {
        fn writes(&self) -> Vec<Vec<u8>> {
            self.session
                .stream()
                .map(|s| s.writes.clone())
                .unwrap_or_default()
        }
    }

    fn legacy(reads: Vec<Vec<u8>>) -> LegacyStation<MockStream> {
        LegacyStation::with_stream_and_nonce(MockStream::new(reads), UnlockNonce::new())
    }

    #[test]
    fn query_end_to_end() {
        let mut station = legacy(vec![
            b"{0@AC,1,DEV001,1.0.0,6,0,0,0,1:1:SN0000001:85:001}\r\n".to_vec(),
        ]);

        let report = station.query().unwrap();
        assert_eq!(report.device_id, "DEV001");
        assert_eq!(report.slots.len(), 1);
        let slot = &report.slots[0];
        assert_eq!(slot.serial_number.as_deref(), Some("SN0000001"));
        assert_eq!(slot.power_level, 85);
        assert!(!slot.flags().charging);

        // Request went out as the documented frame, CR LF terminated.
        let writes = station.writes();
        assert_eq!(writes[0], b"{0@CQ,0,0,0000}\r\n".to_vec());
    }

    #[test]
    fn query_rejects_non_report_reply() {
        let mut station = legacy(vec![b"{0@XX,1}".to_vec()]);
        assert!(matches!(
            station.query(),
            Err(StationError::InvalidResponse(_))
        ));
    }

    #[test]
    fn query_rejects_malformed_envelope() {
        let mut station = legacy(vec![b"{0-AC,1}".to_vec()]);
        assert!(matches!(station.query(), Err(StationError::Frame(_))));
    }

    #[test]
    fn unlock_writes_increasing_nonces() {
        let mut station = legacy(vec![]);
        station.unlock(1).unwrap();
        station.unlock(1).unwrap();

        let writes = station.writes();
        assert_eq!(writes.len(), 2);

        let nonce_of = |w: &Vec<u8>| -> u64 {
            let s = String::from_utf8_lossy(w);
            s.trim_end()
                .trim_start_matches("{0@FB,0,")
                .split(',')
                .next()
                .unwrap()
                .parse()
                .unwrap()
        };
        assert!(nonce_of(&writes[1]) > nonce_of(&writes[0]));

        let text = String::from_utf8_lossy(&writes[0]).into_owned();
        assert!(text.starts_with("{0@FB,0,"));
        assert!(text.ends_with(",1,0000}\r\n"));
    }

    #[test]
    fn unlock_validates_slot_range() {
        let mut station = legacy(vec![]);
        assert!(matches!(
            station.unlock(6),
            Err(StationError::SlotOutOfRange { slot: 6, .. })
        ));
        assert!(station.writes().is_empty());
    }
}
