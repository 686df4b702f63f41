#![cfg_attr(not(test), no_std)]

use embedded_io_async::{Read, ReadReady, Write};
use heapless::Vec;
use log::{debug, warn};

mod constants;
pub use constants::*;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod clock;
pub use clock::*;

pub mod frame;
pub use frame::{build_frame, decode_frame, validate_ack, AckRecord, Direction};

mod session;
pub use session::*;

pub mod telemetry;
pub use telemetry::{Presence, SyncState, Synchronizer, TargetState, TelemetryFrame};

#[cfg(test)]
mod testing;

/// Represents an HLK-LD2412 presence radar.
///
/// The sensor multiplexes two kinds of traffic over one UART: command/ack exchanges
/// while it is in configuration mode, and a continuous stream of telemetry reports
/// otherwise. The driver owns the serial interface, so a command exchange and a
/// telemetry capture can never interleave.
///
/// # Type Parameters
///
/// * `Serial`: The serial interface used to communicate with the sensor.
///   It must implement `embedded_io_async::Read`, `embedded_io_async::ReadReady`
///   and `embedded_io_async::Write`.
/// * `Clk`: A millisecond [`Clock`] used for deadlines and the refresh interval.
pub struct Ld2412<Serial, Clk> {
    serial: Serial,
    clock: Clk,
    config: Config,
    sync: Synchronizer,
    cached: Option<TelemetryFrame>,
    last_capture_ms: Option<u64>,
    last_cleanup_error: Option<Error>,
}

impl<S, C> Ld2412<S, C>
where
    S: Read + Write + ReadReady,
    C: Clock,
{
    /// Creates a new `Ld2412` sensor instance.
    ///
    /// # Arguments
    ///
    /// * `serial`: The serial interface for communication with the sensor.
    /// * `clock`: The millisecond time source.
    /// * `config`: Timeouts and the telemetry refresh interval.
    pub fn new(serial: S, clock: C, config: Config) -> Self {
        Self {
            serial,
            clock,
            config,
            sync: Synchronizer::new(),
            cached: None,
            last_capture_ms: None,
            last_cleanup_error: None,
        }
    }

    /// Gives back the serial interface and the clock.
    pub fn release(self) -> (S, C) {
        (self.serial, self.clock)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The error from the most recent failed attempt to leave configuration mode,
    /// cleared by the next successful one.
    pub fn last_cleanup_error(&self) -> Option<Error> {
        self.last_cleanup_error
    }

    // Frames a command and writes it to the serial port.
    async fn write_frame(&mut self, command_id: u8, payload: &[u8]) -> Result<(), Error> {
        let frame = build_frame(command_id, payload)?;
        debug!("Executing command: {:02X?}", frame.as_slice());
        self.serial
            .write_all(&frame)
            .await
            .map_err(|_| Error::WriteFailure)?;
        self.serial.flush().await.map_err(|_| Error::WriteFailure)?;
        Ok(())
    }

    // Reads one byte if the serial port has one ready.
    async fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        if !self.serial.read_ready().map_err(|_| Error::ReadFailure)? {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        let n = self
            .serial
            .read(&mut byte)
            .await
            .map_err(|_| Error::ReadFailure)?;
        Ok((n == 1).then_some(byte[0]))
    }

    /// Waits for the ack of `expected_id` and validates it.
    ///
    /// Bytes are drained into a fixed capture buffer until `expected_len` bytes have
    /// been captured or `ack_timeout_ms` elapses. Bytes that arrive before a complete
    /// `FD FC FB FA` header are stale telemetry and are dropped.
    ///
    /// # Returns
    ///
    /// * `Ok(AckRecord)` if the captured frame matches at every fixed offset.
    /// * `Err(Error::BufferOverrun)` if `expected_len` exceeds the capture buffer.
    /// * `Err(Error::Timeout)` if fewer than `expected_len` bytes arrived in time.
    /// * `Err(Error::MalformedFrame)` if any checked byte mismatches.
    pub async fn await_ack(
        &mut self,
        expected_id: u8,
        expected_len: usize,
    ) -> Result<AckRecord, Error> {
        if expected_len > ACK_BUFFER_SIZE {
            log::error!(
                "Expected ack of {} bytes exceeds capture buffer of {}",
                expected_len,
                ACK_BUFFER_SIZE
            );
            return Err(Error::BufferOverrun);
        }

        let deadline = self.clock.now_ms().saturating_add(self.config.ack_timeout_ms);
        let mut buffer: Vec<u8, ACK_BUFFER_SIZE> = Vec::new();
        let mut skipped = 0usize;

        while buffer.len() < expected_len {
            if self.clock.now_ms() >= deadline {
                debug!(
                    "Ack {:02X} timed out after {} of {} bytes: {:02X?}",
                    expected_id,
                    buffer.len(),
                    expected_len,
                    buffer.as_slice()
                );
                return Err(Error::Timeout);
            }
            let Some(byte) = self.read_byte().await? else {
                continue;
            };
            // Rolling header match: a mismatch drops the partial header, but the byte
            // may still open a new one.
            let matched = buffer.len();
            if matched < CMD_HEADER.len() && byte != CMD_HEADER[matched] {
                skipped += matched;
                buffer.clear();
                if byte != CMD_HEADER[0] {
                    skipped += 1;
                    continue;
                }
            }
            buffer.push(byte).map_err(|_| Error::BufferOverrun)?;
        }

        if skipped > 0 {
            warn!("Discarded {} stale bytes before ack {:02X}", skipped, expected_id);
        }

        let ack = AckRecord::parse(&buffer, expected_id, expected_len)?;
        debug!("Successfully read and validated ack: {:02X?}", ack.as_bytes());
        Ok(ack)
    }

    #[cfg(test)]
    pub(crate) fn serial(&self) -> &S {
        &self.serial
    }

    #[cfg(test)]
    pub(crate) fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }
}
