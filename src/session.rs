//! Transport session: one half-duplex serial channel, one outstanding
//! request.
//!
//! The session owns the open byte stream, serializes outgoing frames,
//! accumulates incoming bytes, and decides when a response frame is
//! complete. Responses carry no request id; correlation rests entirely
//! on the invariant that at most one request is in flight. A request
//! token guards that invariant: starting a new request supersedes the
//! previous token, and completing a superseded token fails rather than
//! misattributing a reply.
//!
//! Frame completion is a closed set of boundary rules consuming the
//! byte stream, so it can be exercised against synthetic sequences
//! without hardware:
//!
//! - binary boards stream bytes with no length prefix; a response is
//!   complete once no new byte arrives for the inter-byte silence
//!   window
//! - legacy boards bracket their frames, so completion is a start
//!   delimiter followed by an end delimiter in the buffer
//!
//! Timeouts and transport write failures are retried internally up to
//! a fixed attempt cap. Frame corruption is never retried here;
//! resending over a desynchronized stream compounds the misalignment,
//! so it surfaces to the caller as a distinct error.

use crate::constants::{
    INTER_BYTE_SILENCE, INTER_COMMAND_DELAY, LEGACY_FRAME_END, LEGACY_FRAME_START,
    LEGACY_RESPONSE_TIMEOUT, MAX_RETRIES, RESPONSE_TIMEOUT, RETRY_DELAY,
};
use crate::error::{Result, StationError};
use crate::stream::ByteStream;
use std::thread;
use std::time::{Duration, Instant};

/// How the session recognizes that a response frame is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBoundary {
    /// Complete after a quiet interval with no new byte
    SilenceWindow(Duration),
    /// Complete once a start byte and a matching end byte are buffered
    Delimited { start: u8, end: u8 },
}

/// Timing and framing configuration for one protocol variant.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub boundary: FrameBoundary,
    /// Per-attempt response deadline, measured from write completion
    pub response_timeout: Duration,
    /// Minimum bus idle time after a successful exchange
    pub inter_command_delay: Duration,
    /// Delay between retry attempts
    pub retry_delay: Duration,
    /// Total attempts for one logical command
    pub max_retries: u32,
}

impl SessionConfig {
    /// Configuration for the binary framed protocol.
    pub fn binary() -> Self {
        SessionConfig {
            boundary: FrameBoundary::SilenceWindow(INTER_BYTE_SILENCE),
            response_timeout: RESPONSE_TIMEOUT,
            inter_command_delay: INTER_COMMAND_DELAY,
            retry_delay: RETRY_DELAY,
            max_retries: MAX_RETRIES,
        }
    }

    /// Configuration for the legacy ASCII protocol.
    pub fn legacy() -> Self {
        SessionConfig {
            boundary: FrameBoundary::Delimited {
                start: LEGACY_FRAME_START,
                end: LEGACY_FRAME_END,
            },
            response_timeout: LEGACY_RESPONSE_TIMEOUT,
            inter_command_delay: INTER_COMMAND_DELAY,
            retry_delay: RETRY_DELAY,
            max_retries: MAX_RETRIES,
        }
    }
}

/// Handle for one in-flight request.
///
/// Not clonable: exactly one party can complete a request.
#[derive(Debug)]
pub struct RequestToken {
    id: u64,
}

/// One open serial channel carrying one command at a time.
pub struct Session<S: ByteStream> {
    stream: Option<S>,
    config: SessionConfig,
    buf: Vec<u8>,
    next_id: u64,
    pending: Option<u64>,
    last_exchange: Option<Instant>,
}

impl<S: ByteStream> Session<S> {
    /// Wrap an already-open byte stream.
    pub fn new(stream: S, config: SessionConfig) -> Self {
        Session {
            stream: Some(stream),
            config,
            buf: Vec::new(),
            next_id: 0,
            pending: None,
            last_exchange: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the channel, discard buffered bytes, and fail any
    /// outstanding request token with `SessionClosed`.
    pub fn disconnect(&mut self) {
        if self.pending.take().is_some() {
            log::warn!("disconnecting with a request outstanding");
        }
        self.buf.clear();
        self.stream = None;
        log::debug!("session disconnected");
    }

    /// Register the one pending request, superseding any prior token.
    ///
    /// The holder of a superseded token learns its fate on
    /// [`Session::complete`]; it is never silently dropped.
    pub fn begin(&mut self) -> Result<RequestToken> {
        if self.stream.is_none() {
            return Err(StationError::SessionClosed);
        }
        if self.pending.is_some() {
            log::warn!("new command supersedes a pending request");
        }
        self.next_id += 1;
        self.pending = Some(self.next_id);
        Ok(RequestToken { id: self.next_id })
    }

    /// Resolve a request token.
    ///
    /// Fails with `Superseded` when a later `begin` took the channel,
    /// or `SessionClosed` after a disconnect.
    pub fn complete(&mut self, token: RequestToken) -> Result<()> {
        if self.stream.is_none() {
            return Err(StationError::SessionClosed);
        }
        match self.pending {
            Some(id) if id == token.id => {
                self.pending = None;
                Ok(())
            }
            _ => Err(StationError::Superseded),
        }
    }

    /// Send a wire frame and wait for one complete response frame,
    /// retrying on timeout or write failure up to the attempt cap.
    ///
    /// The returned bytes are the raw complete frame; integrity
    /// checking belongs to the codec so that corruption surfaces
    /// unretried.
    pub fn send_frame(&mut self, wire: &[u8]) -> Result<Vec<u8>> {
        let token = self.begin()?;
        let result = self.exchange_with_retry(wire);
        self.complete(token)?;
        result
    }

    /// Send a wire frame without waiting for any response.
    pub fn send_frame_no_response(&mut self, wire: &[u8]) -> Result<()> {
        let token = self.begin()?;
        let result = (|| -> Result<()> {
            self.enforce_spacing();
            let stream = self.stream.as_mut().ok_or(StationError::SessionClosed)?;
            stream.flush_input()?;
            stream.write_all(wire)?;
            self.last_exchange = Some(Instant::now());
            Ok(())
        })();
        self.complete(token)?;
        result
    }

    fn exchange_with_retry(&mut self, wire: &[u8]) -> Result<Vec<u8>> {
        let mut last_err = None;

        for attempt in 1..=self.config.max_retries {
            log::debug!("attempt {}/{}", attempt, self.config.max_retries);
            match self.attempt_exchange(wire) {
                Ok(frame) => {
                    if attempt > 1 {
                        log::info!("exchange succeeded on attempt {attempt}");
                    }
                    self.last_exchange = Some(Instant::now());
                    return Ok(frame);
                }
                Err(e) if e.is_retryable() => {
                    log::warn!(
                        "attempt {}/{} failed: {e}",
                        attempt,
                        self.config.max_retries
                    );
                    last_err = Some(e);
                    if attempt < self.config.max_retries {
                        thread::sleep(self.config.retry_delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // Exhausted retries surface the last concrete error.
        Err(last_err.unwrap_or(StationError::ResponseTimeout))
    }

    fn attempt_exchange(&mut self, wire: &[u8]) -> Result<Vec<u8>> {
        self.enforce_spacing();

        let stream = self.stream.as_mut().ok_or(StationError::SessionClosed)?;
        stream.flush_input()?;
        self.buf.clear();
        stream.write_all(wire)?;
        log::trace!("wrote {} bytes", wire.len());

        // The timeout clock starts at write completion.
        let deadline = Instant::now() + self.config.response_timeout;

        loop {
            // The deadline binds even while bytes keep arriving; a
            // device that never goes quiet must not pin the session.
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StationError::ResponseTimeout);
            }

            let wait = match self.config.boundary {
                FrameBoundary::SilenceWindow(quiet) if !self.buf.is_empty() => quiet,
                _ => remaining.min(Duration::from_millis(100)),
            };

            let mut chunk = [0u8; 256];
            let n = stream.read_available(&mut chunk, wait)?;

            if n == 0 {
                if let FrameBoundary::SilenceWindow(_) = self.config.boundary {
                    if !self.buf.is_empty() {
                        // Quiet interval elapsed: the frame is done.
                        log::trace!("frame complete after silence, {} bytes", self.buf.len());
                        return Ok(std::mem::take(&mut self.buf));
                    }
                }
                continue;
            }

            self.buf.extend_from_slice(&chunk[..n]);

            if let FrameBoundary::Delimited { start, end } = self.config.boundary {
                if let Some(frame) = extract_delimited(&mut self.buf, start, end) {
                    log::trace!("frame complete by delimiter, {} bytes", frame.len());
                    return Ok(frame);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn stream(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    fn enforce_spacing(&self) {
        if let Some(last) = self.last_exchange {
            let elapsed = last.elapsed();
            if elapsed < self.config.inter_command_delay {
                thread::sleep(self.config.inter_command_delay - elapsed);
            }
        }
    }
}

/// Pull the first `start..=end` delimited frame out of the buffer,
/// discarding everything up to and including the end delimiter.
fn extract_delimited(buf: &mut Vec<u8>, start: u8, end: u8) -> Option<Vec<u8>> {
    let start_pos = buf.iter().position(|&b| b == start)?;
    let end_pos = buf[start_pos..].iter().position(|&b| b == end)? + start_pos;
    let frame = buf[start_pos..=end_pos].to_vec();
    buf.drain(..=end_pos);
    Some(frame)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted in-memory stream modeling the half-duplex bus: each
    /// write releases the next scripted response, optionally split
    /// into several read bursts. Nothing arrives before the request
    /// goes out, so a reply queued for a later command can never bleed
    /// into the current frame. An exhausted script reads as permanent
    /// quiet.
    pub(crate) struct MockStream {
        scripts: VecDeque<Vec<Vec<u8>>>,
        current: VecDeque<Vec<u8>>,
        pub writes: Vec<Vec<u8>>,
        pub flushes: usize,
    }

    impl MockStream {
        /// One whole response burst per write.
        pub fn new(replies: Vec<Vec<u8>>) -> Self {
            Self::scripted(replies.into_iter().map(|r| vec![r]).collect())
        }

        /// One response per write, each delivered as several bursts.
        pub fn scripted(scripts: Vec<Vec<Vec<u8>>>) -> Self {
            MockStream {
                scripts: scripts.into(),
                current: VecDeque::new(),
                writes: Vec::new(),
                flushes: 0,
            }
        }

        pub fn silent() -> Self {
            Self::new(Vec::new())
        }
    }

    impl ByteStream for MockStream {
        fn write_all(&mut self, data: &[u8]) -> Result<()> {
            self.writes.push(data.to_vec());
            self.current = self.scripts.pop_front().unwrap_or_default().into();
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            match self.current.pop_front() {
                Some(burst) => {
                    buf[..burst.len()].copy_from_slice(&burst);
                    Ok(burst.len())
                }
                None => {
                    // Honor the bounded wait so deadline logic advances.
                    thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(0)
                }
            }
        }

        fn flush_input(&mut self) -> Result<()> {
            self.flushes += 1;
            self.current.clear();
            Ok(())
        }
    }

    pub(crate) fn fast_config(boundary: FrameBoundary) -> SessionConfig {
        SessionConfig {
            boundary,
            response_timeout: Duration::from_millis(20),
            inter_command_delay: Duration::ZERO,
            retry_delay: Duration::from_millis(1),
            max_retries: MAX_RETRIES,
        }
    }

    fn binary_fast() -> SessionConfig {
        fast_config(FrameBoundary::SilenceWindow(Duration::from_millis(2)))
    }

    #[test]
    fn silence_window_assembles_split_bursts() {
        let stream = MockStream::scripted(vec![vec![vec![0xEA, 0x01], vec![0x02, 0x03]]]);
        let mut session = Session::new(stream, binary_fast());
        let frame = session.send_frame(&[0xAA]).unwrap();
        assert_eq!(frame, vec![0xEA, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn one_reply_released_per_write() {
        let stream = MockStream::new(vec![vec![0xEA, 0x01, 0x00], vec![0xEA, 0x02, 0x00]]);
        let mut session = Session::new(stream, binary_fast());
        // Back-to-back exchanges: each frame ends at its own silence
        // window, with no bleed from the next queued reply.
        assert_eq!(session.send_frame(&[0x01]).unwrap(), vec![0xEA, 0x01, 0x00]);
        assert_eq!(session.send_frame(&[0x02]).unwrap(), vec![0xEA, 0x02, 0x00]);
    }

    #[test]
    fn delimited_frame_skips_leading_noise() {
        let stream = MockStream::scripted(vec![vec![b"xx{0@AC".to_vec(), b",1}tail".to_vec()]]);
        let mut session = Session::new(
            stream,
            fast_config(FrameBoundary::Delimited {
                start: b'{',
                end: b'}',
            }),
        );
        let frame = session.send_frame(b"{0@CQ,0,0,0000}\r\n").unwrap();
        assert_eq!(frame, b"{0@AC,1}".to_vec());
    }

    /// Byte stream that never goes quiet: one byte every few
    /// milliseconds, forever.
    struct ChatterStream;

    impl ByteStream for ChatterStream {
        fn write_all(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read_available(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            thread::sleep(Duration::from_millis(3));
            buf[0] = 0x55;
            Ok(1)
        }

        fn flush_input(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn chattering_device_still_hits_the_deadline() {
        let mut config = fast_config(FrameBoundary::SilenceWindow(Duration::from_millis(5)));
        config.response_timeout = Duration::from_millis(50);
        config.max_retries = 1;
        let mut session = Session::new(ChatterStream, config);

        let started = Instant::now();
        let err = session.send_frame(&[0x01]).unwrap_err();
        assert!(matches!(err, StationError::ResponseTimeout));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn timeout_only_after_all_attempts() {
        let mut session = Session::new(MockStream::silent(), binary_fast());
        let started = Instant::now();
        let err = session.send_frame(&[0x01]).unwrap_err();
        assert!(matches!(err, StationError::ResponseTimeout));

        // One write per attempt, all five attempts exhausted, and not
        // a moment before the per-attempt deadlines elapsed.
        let writes = session.stream.as_ref().unwrap().writes.len();
        assert_eq!(writes, MAX_RETRIES as usize);
        assert!(started.elapsed() >= Duration::from_millis(20 * MAX_RETRIES as u64));
    }

    #[test]
    fn flushes_stale_input_before_write() {
        let stream = MockStream::new(vec![vec![0xEA, 0x05, 0x00]]);
        let mut session = Session::new(stream, binary_fast());
        session.send_frame(&[0x01]).unwrap();
        assert!(session.stream.as_ref().unwrap().flushes >= 1);
    }

    #[test]
    fn superseded_token_fails_newer_completes() {
        let mut session = Session::new(MockStream::silent(), binary_fast());
        let first = session.begin().unwrap();
        let second = session.begin().unwrap();

        assert!(matches!(session.complete(second), Ok(())));
        assert!(matches!(
            session.complete(first),
            Err(StationError::Superseded)
        ));
    }

    #[test]
    fn send_works_after_a_superseded_request() {
        let mut session = Session::new(
            MockStream::new(vec![vec![0xEA, 0x01, 0x00]]),
            binary_fast(),
        );
        let stale = session.begin().unwrap();
        let frame = session.send_frame(&[0x02]).unwrap();
        assert_eq!(frame, vec![0xEA, 0x01, 0x00]);
        assert!(matches!(
            session.complete(stale),
            Err(StationError::Superseded)
        ));
    }

    #[test]
    fn disconnect_rejects_pending_and_closes() {
        let mut session = Session::new(MockStream::silent(), binary_fast());
        let token = session.begin().unwrap();
        session.disconnect();
        assert!(!session.is_open());
        assert!(matches!(
            session.complete(token),
            Err(StationError::SessionClosed)
        ));
        assert!(matches!(
            session.send_frame(&[0x01]),
            Err(StationError::SessionClosed)
        ));
    }

    #[test]
    fn no_response_send_writes_once() {
        let mut session = Session::new(MockStream::silent(), binary_fast());
        session.send_frame_no_response(b"{0@FB,0,1,1,0000}\r\n").unwrap();
        let stream = session.stream.as_ref().unwrap();
        assert_eq!(stream.writes.len(), 1);
    }
}
