//! Telemetry stream synchronization.
//!
//! Outside configuration mode the sensor streams fixed 21-byte reports:
//!
//! ```text
//! F4 F3 F2 F1 | 0B 00 | 02 AA | state | mov_dist(LE) | mov_energy | stat_dist(LE) | stat_energy | 55 00 | F8 F7 F6 F5
//! ```
//!
//! The link offers no delimiting besides those markers, so [`Synchronizer`] is fed
//! byte by byte and throws away any partial frame whose header breaks.

use embedded_io_async::{Read, ReadReady, Write};
use log::debug;

use crate::{
    Clock, Error, Ld2412, MOVING_DISTANCE_IDX, MOVING_ENERGY_IDX, STATIC_DISTANCE_IDX,
    STATIC_ENERGY_IDX, TARGET_STATE_IDX, TELEMETRY_FOOTER, TELEMETRY_FOOTER_IDX,
    TELEMETRY_FRAME_LEN, TELEMETRY_HEADER,
};

/// What the sensor currently detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    NoTarget,
    Moving,
    Stationary,
    Both,
}

impl TryFrom<u8> for TargetState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(TargetState::NoTarget),
            0x01 => Ok(TargetState::Moving),
            0x02 => Ok(TargetState::Stationary),
            0x03 => Ok(TargetState::Both),
            _ => Err(Error::MalformedFrame),
        }
    }
}

/// A complete telemetry report as it arrived on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame([u8; TELEMETRY_FRAME_LEN]);

impl TelemetryFrame {
    pub fn as_bytes(&self) -> &[u8; TELEMETRY_FRAME_LEN] {
        &self.0
    }

    pub fn target_state(&self) -> Result<TargetState, Error> {
        TargetState::try_from(self.0[TARGET_STATE_IDX])
    }

    /// Moving target distance in cm.
    pub fn moving_distance(&self) -> u16 {
        self.u16_at(MOVING_DISTANCE_IDX)
    }

    pub fn moving_energy(&self) -> u8 {
        self.0[MOVING_ENERGY_IDX]
    }

    /// Static target distance in cm.
    pub fn static_distance(&self) -> u16 {
        self.u16_at(STATIC_DISTANCE_IDX)
    }

    pub fn static_energy(&self) -> u8 {
        self.0[STATIC_ENERGY_IDX]
    }

    /// All readings at once.
    pub fn presence(&self) -> Result<Presence, Error> {
        Ok(Presence {
            target_state: self.target_state()?,
            moving_distance_cm: self.moving_distance(),
            moving_energy: self.moving_energy(),
            static_distance_cm: self.static_distance(),
            static_energy: self.static_energy(),
        })
    }

    fn u16_at(&self, idx: usize) -> u16 {
        u16::from_le_bytes([self.0[idx], self.0[idx + 1]])
    }
}

/// Readings decoded from one telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub target_state: TargetState,
    pub moving_distance_cm: u16,
    pub moving_energy: u8,
    pub static_distance_cm: u16,
    pub static_energy: u8,
}

impl Presence {
    /// Any target detected.
    pub fn is_present(&self) -> bool {
        self.target_state != TargetState::NoTarget
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    SeekingHeader,
    Capturing,
    Complete,
    TimedOut,
}

/// Byte-fed capture window for telemetry frames.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    window: [u8; TELEMETRY_FRAME_LEN],
    cursor: usize,
    state: SyncState,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        Synchronizer {
            window: [0; TELEMETRY_FRAME_LEN],
            cursor: 0,
            state: SyncState::SeekingHeader,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Number of bytes captured for the frame in progress.
    pub fn captured(&self) -> usize {
        self.cursor
    }

    /// Drops any partial frame and starts seeking a header again.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.state = SyncState::SeekingHeader;
    }

    /// Marks the attempt in progress as expired.
    pub fn expire(&mut self) {
        self.cursor = 0;
        self.state = SyncState::TimedOut;
    }

    /// Feeds one byte.
    ///
    /// Returns `Ok(Some(frame))` when the byte completes a frame, `Ok(None)` while
    /// a header is being sought or a frame is being captured, and
    /// `Err(Error::MalformedFrame)` when a footer byte does not match. A header
    /// mismatch is not an error: progress is dropped and the byte is reconsidered
    /// as the start of a new header.
    pub fn push(&mut self, byte: u8) -> Result<Option<TelemetryFrame>, Error> {
        if matches!(self.state, SyncState::Complete | SyncState::TimedOut) {
            self.reset();
        }

        if self.cursor < TELEMETRY_HEADER.len() {
            if byte == TELEMETRY_HEADER[self.cursor] {
                self.store(byte)?;
            } else {
                self.reset();
                if byte == TELEMETRY_HEADER[0] {
                    self.store(byte)?;
                }
            }
            return Ok(None);
        }

        if self.cursor >= TELEMETRY_FOOTER_IDX
            && byte != TELEMETRY_FOOTER[self.cursor - TELEMETRY_FOOTER_IDX]
        {
            debug!(
                "Telemetry footer mismatch at {}: {:02X?}",
                self.cursor,
                &self.window[..self.cursor]
            );
            self.expire();
            return Err(Error::MalformedFrame);
        }

        self.store(byte)?;
        if self.cursor == TELEMETRY_FRAME_LEN {
            let frame = TelemetryFrame(self.window);
            self.cursor = 0;
            self.state = SyncState::Complete;
            return Ok(Some(frame));
        }
        Ok(None)
    }

    fn store(&mut self, byte: u8) -> Result<(), Error> {
        let slot = self.window.get_mut(self.cursor).ok_or(Error::BufferOverrun)?;
        *slot = byte;
        self.cursor += 1;
        self.state = SyncState::Capturing;
        Ok(())
    }
}

impl<S, C> Ld2412<S, C>
where
    S: Read + Write + ReadReady,
    C: Clock,
{
    /// Returns the most recent telemetry frame.
    ///
    /// A cached frame younger than `refresh_interval_ms` is returned without touching
    /// the serial link. Otherwise a new frame is captured within `capture_timeout_ms`.
    /// A failed capture leaves the previously cached frame in place.
    pub async fn read_latest(&mut self) -> Result<TelemetryFrame, Error> {
        if let (Some(frame), Some(captured_at)) = (self.cached, self.last_capture_ms) {
            let age = self.clock.now_ms().saturating_sub(captured_at);
            if age < self.config.refresh_interval_ms {
                return Ok(frame);
            }
        }

        let frame = self.capture().await?;
        self.cached = Some(frame);
        self.last_capture_ms = Some(self.clock.now_ms());
        Ok(frame)
    }

    // Runs the synchronizer until one frame completes, a footer breaks or the deadline passes.
    async fn capture(&mut self) -> Result<TelemetryFrame, Error> {
        let deadline = self
            .clock
            .now_ms()
            .saturating_add(self.config.capture_timeout_ms);
        self.sync.reset();

        loop {
            if self.clock.now_ms() >= deadline {
                debug!(
                    "Telemetry capture timed out with {} bytes captured",
                    self.sync.captured()
                );
                self.sync.expire();
                return Err(Error::Timeout);
            }

            let Some(byte) = self.read_byte().await? else {
                continue;
            };
            if let Some(frame) = self.sync.push(byte)? {
                debug!("Telemetry frame captured: {:02X?}", frame.as_bytes());
                return Ok(frame);
            }
        }
    }

    /// Cached frame from the last successful capture, regardless of its age.
    pub fn last_frame(&self) -> Option<TelemetryFrame> {
        self.cached
    }

    /// Forces the next read to capture a new frame.
    pub fn invalidate(&mut self) {
        self.last_capture_ms = None;
    }

    /// Reads all target readings from one frame.
    pub async fn read_presence(&mut self) -> Result<Presence, Error> {
        self.read_latest().await?.presence()
    }

    /// Target state: none, moving, stationary or both.
    pub async fn target_state(&mut self) -> Result<TargetState, Error> {
        self.read_latest().await?.target_state()
    }

    /// Moving target distance in cm.
    pub async fn moving_distance(&mut self) -> Result<u16, Error> {
        Ok(self.read_latest().await?.moving_distance())
    }

    pub async fn moving_energy(&mut self) -> Result<u8, Error> {
        Ok(self.read_latest().await?.moving_energy())
    }

    /// Static target distance in cm.
    pub async fn static_distance(&mut self) -> Result<u16, Error> {
        Ok(self.read_latest().await?.static_distance())
    }

    pub async fn static_energy(&mut self) -> Result<u8, Error> {
        Ok(self.read_latest().await?.static_energy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{telemetry_bytes, MockClock, MockSerial};
    use crate::Config;
    use futures::executor::block_on;

    fn feed(sync: &mut Synchronizer, bytes: &[u8]) -> Vec<Result<Option<TelemetryFrame>, Error>> {
        bytes.iter().map(|&b| sync.push(b)).collect()
    }

    #[test]
    fn broken_header_never_completes() {
        let mut sync = Synchronizer::new();
        let mut bytes = vec![0xF4, 0xF3, 0x00, 0xF1];
        bytes.extend_from_slice(&[0x11; 13]);
        bytes.extend_from_slice(&TELEMETRY_FOOTER);

        let results = feed(&mut sync, &bytes);
        assert!(results.iter().all(|r| matches!(r, Ok(None))));
        assert_eq!(sync.state(), SyncState::SeekingHeader);
    }

    #[test]
    fn header_payload_footer_yields_one_frame() {
        let mut sync = Synchronizer::new();
        let mut bytes = TELEMETRY_HEADER.to_vec();
        bytes.extend_from_slice(&[0xF4; 13]);
        bytes.extend_from_slice(&TELEMETRY_FOOTER);

        let frames: Vec<_> = feed(&mut sync, &bytes)
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].as_bytes()[..], &bytes[..]);
        assert_eq!(sync.state(), SyncState::Complete);
    }

    #[test]
    fn resynchronizes_after_garbage_and_partial_headers() {
        let mut sync = Synchronizer::new();
        let report = telemetry_bytes(0x03, 150, 60, 90, 20);
        let mut bytes = vec![0x00, 0xF4, 0xF3, 0xF2, 0x55, 0xF4, 0xF4];
        bytes.extend_from_slice(&report[1..]);

        let frames: Vec<_> = feed(&mut sync, &bytes)
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].as_bytes()[..], &report[..]);
    }

    #[test]
    fn footer_mismatch_abandons_the_frame() {
        let mut sync = Synchronizer::new();
        let mut report = telemetry_bytes(0x01, 100, 50, 0, 0);
        report[19] = 0x00;

        let results = feed(&mut sync, &report[..20]);
        assert_eq!(results[19], Err(Error::MalformedFrame));
        assert_eq!(sync.state(), SyncState::TimedOut);
        assert_eq!(sync.captured(), 0);

        // The next good frame is captured from scratch.
        let good = telemetry_bytes(0x01, 100, 50, 0, 0);
        let frames: Vec<_> = feed(&mut sync, &good)
            .into_iter()
            .filter_map(|r| r.unwrap())
            .collect();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn fields_use_little_endian_distances() {
        let mut sync = Synchronizer::new();
        let report = telemetry_bytes(0x02, 0x0132, 77, 0x0201, 33);
        let frame = feed(&mut sync, &report)
            .into_iter()
            .find_map(|r| r.unwrap())
            .unwrap();

        assert_eq!(frame.target_state(), Ok(TargetState::Stationary));
        assert_eq!(frame.moving_distance(), 306);
        assert_eq!(frame.moving_energy(), 77);
        assert_eq!(frame.static_distance(), 513);
        assert_eq!(frame.static_energy(), 33);
        assert!(frame.presence().unwrap().is_present());
    }

    #[test]
    fn unknown_target_state_is_malformed() {
        assert_eq!(TargetState::try_from(0x04), Err(Error::MalformedFrame));
    }

    #[test]
    fn reads_within_refresh_interval_reuse_the_cached_frame() {
        let clock = MockClock::new(1);
        let serial = MockSerial::with_rx(&telemetry_bytes(0x01, 120, 40, 0, 0));
        let mut radar = Ld2412::new(serial, clock.clone(), Config::default());

        let first = block_on(radar.read_latest()).unwrap();
        let reads = radar.serial().read_calls;

        radar.serial_mut().feed(&telemetry_bytes(0x02, 0, 0, 300, 90));
        let second = block_on(radar.read_latest()).unwrap();
        assert_eq!(first, second);
        assert_eq!(radar.serial().read_calls, reads);

        clock.advance(1000);
        let third = block_on(radar.read_latest()).unwrap();
        assert_eq!(third.target_state(), Ok(TargetState::Stationary));
        assert_eq!(third.static_distance(), 300);
    }

    #[test]
    fn read_after_interval_without_new_bytes_times_out_and_keeps_cache() {
        let clock = MockClock::new(1);
        let serial = MockSerial::with_rx(&telemetry_bytes(0x01, 120, 40, 0, 0));
        let mut radar = Ld2412::new(serial, clock.clone(), Config::default());

        let first = block_on(radar.read_latest()).unwrap();
        clock.advance(5000);
        assert_eq!(block_on(radar.read_latest()), Err(Error::Timeout));
        assert_eq!(block_on(radar.moving_distance()), Err(Error::Timeout));
        assert_eq!(radar.last_frame(), Some(first));
    }

    #[test]
    fn accessors_fail_before_any_frame() {
        let mut radar = Ld2412::new(MockSerial::new(), MockClock::new(1), Config::default());
        assert_eq!(block_on(radar.target_state()), Err(Error::Timeout));
        assert_eq!(radar.last_frame(), None);
    }

    #[test]
    fn accessors_report_frame_fields() {
        let mut serial = MockSerial::with_rx(&[0x12, 0x34, 0xF4]);
        serial.feed(&telemetry_bytes(0x03, 245, 88, 130, 61));
        let mut radar = Ld2412::new(serial, MockClock::new(1), Config::default());

        assert_eq!(block_on(radar.target_state()), Ok(TargetState::Both));
        assert_eq!(block_on(radar.moving_distance()), Ok(245));
        assert_eq!(block_on(radar.moving_energy()), Ok(88));
        assert_eq!(block_on(radar.static_distance()), Ok(130));
        assert_eq!(block_on(radar.static_energy()), Ok(61));
        assert_eq!(radar.serial().read_calls, 24);
    }

    #[test]
    fn invalidate_forces_a_new_capture() {
        let mut serial = MockSerial::with_rx(&telemetry_bytes(0x01, 10, 1, 0, 0));
        serial.feed(&telemetry_bytes(0x00, 0, 0, 0, 0));
        let mut radar = Ld2412::new(serial, MockClock::new(1), Config::default());

        assert_eq!(block_on(radar.target_state()), Ok(TargetState::Moving));
        radar.invalidate();
        let presence = block_on(radar.read_presence()).unwrap();
        assert!(!presence.is_present());
    }
}
