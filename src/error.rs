//! Error types for station protocol operations.

use thiserror::Error;

/// Result type alias for station operations.
pub type Result<T> = std::result::Result<T, StationError>;

/// Frame-level decode failures.
///
/// These indicate byte-level corruption or a desynchronized stream and
/// are never retried transparently by the session: retrying a corrupt
/// exchange without re-synchronizing risks compounding the misalignment.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame shorter than marker + address + CRC
    #[error("frame too short: {len} bytes")]
    TooShort {
        /// Number of bytes received
        len: usize,
    },

    /// First byte was not the protocol start marker
    #[error("invalid start marker: {found:#04x}")]
    BadStartMarker {
        /// Byte found where the marker was expected
        found: u8,
    },

    /// Recomputed CRC16 disagrees with the frame trailer
    #[error("CRC mismatch: received {received:#06x}, calculated {calculated:#06x}")]
    ChecksumMismatch {
        /// CRC carried by the frame
        received: u16,
        /// CRC computed over the interior bytes
        calculated: u16,
    },

    /// ASCII frame did not split into exactly an address and a command segment
    #[error("malformed envelope")]
    MalformedEnvelope,
}

/// Error types for station board communication.
#[derive(Error, Debug)]
pub enum StationError {
    /// Serial port communication error
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Board-local slot index outside 0..=5
    #[error("slot {slot} out of range (0-{max})")]
    SlotOutOfRange {
        /// Offending slot index
        slot: u8,
        /// Highest valid board-local slot
        max: u8,
    },

    /// Flat slot index outside 1..=30
    #[error("slot index {index} out of range (1-30)")]
    SlotIndexOutOfRange {
        /// Offending flat slot index
        index: u8,
    },

    /// Board address outside the configured chain
    #[error("board address {board} exceeds maximum {max}")]
    BoardAddressOutOfRange {
        /// Offending board address
        board: u8,
        /// Highest valid board address
        max: u8,
    },

    /// Command argument does not match the opcode's fixed payload width
    #[error("invalid argument length for {what}: expected {expected}, got {actual}")]
    InvalidArgumentLength {
        /// Which argument was malformed
        what: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Byte-level frame corruption (not retried by the session)
    #[error("invalid response frame: {0}")]
    Frame(#[from] FrameError),

    /// No complete, valid frame arrived within the deadline
    #[error("response timeout")]
    ResponseTimeout,

    /// Response frame parsed but its payload does not fit the expected layout
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Reply echoed an opcode this library does not know
    #[error("unsupported command opcode {opcode:#04x}")]
    UnsupportedCommand {
        /// Echoed opcode
        opcode: u8,
    },

    /// Session was closed while a request was outstanding
    #[error("session closed")]
    SessionClosed,

    /// A newer request took the channel before this one resolved
    #[error("request superseded by a newer command")]
    Superseded,
}

impl StationError {
    /// Whether the session may transparently retry after this error.
    ///
    /// Timeouts and transport-level I/O failures are retryable; frame
    /// corruption and validation errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StationError::ResponseTimeout | StationError::Io(_) | StationError::SerialPort(_)
        )
    }
}
