// Scripted serial port and clock shared by the unit tests.

use core::convert::Infallible;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_io_async::{ErrorType, Read, ReadReady, Write};

use crate::{Clock, CMD_FOOTER, CMD_HEADER, TELEMETRY_FOOTER, TELEMETRY_HEADER};

/// Serial double: every `write` call pops the next scripted reply into the receive queue.
#[derive(Default)]
pub struct MockSerial {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub writes: Vec<Vec<u8>>,
    pub replies: VecDeque<Vec<u8>>,
    pub read_calls: usize,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes already waiting on the line.
    pub fn with_rx(bytes: &[u8]) -> Self {
        let mut serial = Self::new();
        serial.rx.extend(bytes.iter().copied());
        serial
    }

    /// Queues the bytes the "device" sends after the next command write.
    pub fn reply(mut self, bytes: Vec<u8>) -> Self {
        self.replies.push_back(bytes);
        self
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl ErrorType for MockSerial {
    type Error = Infallible;
}

impl Read for MockSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_calls += 1;
        let mut n = 0;
        while n < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl Write for MockSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        self.writes.push(buf.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Millisecond clock that moves forward by `step` every time it is read.
#[derive(Clone)]
pub struct MockClock {
    now: Rc<Cell<u64>>,
    step: u64,
}

impl MockClock {
    pub fn new(step: u64) -> Self {
        MockClock {
            now: Rc::new(Cell::new(0)),
            step,
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Builds an ack of `total_len` bytes. `results` fill the bytes after the status word.
pub fn ack_bytes(command_id: u8, status: u8, total_len: usize, results: &[u8]) -> Vec<u8> {
    let mut ack = Vec::with_capacity(total_len);
    ack.extend_from_slice(&CMD_HEADER);
    ack.extend_from_slice(&[(total_len - 12) as u8, 0x00, command_id, 0x01, status, 0x00]);
    ack.extend_from_slice(results);
    ack.resize(total_len - CMD_FOOTER.len(), 0x00);
    ack.extend_from_slice(&CMD_FOOTER);
    ack
}

/// Builds a 21-byte normal-mode telemetry report.
pub fn telemetry_bytes(
    state: u8,
    moving_distance: u16,
    moving_energy: u8,
    static_distance: u16,
    static_energy: u8,
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(21);
    frame.extend_from_slice(&TELEMETRY_HEADER);
    frame.extend_from_slice(&[0x0B, 0x00, 0x02, 0xAA, state]);
    frame.extend_from_slice(&moving_distance.to_le_bytes());
    frame.push(moving_energy);
    frame.extend_from_slice(&static_distance.to_le_bytes());
    frame.push(static_energy);
    frame.extend_from_slice(&[0x55, 0x00]);
    frame.extend_from_slice(&TELEMETRY_FOOTER);
    frame
}
