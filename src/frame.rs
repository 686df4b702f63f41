//! Wire framing shared by commands, acks and telemetry reports.
//!
//! Every frame is laid out as `HEADER(4) | LENGTH(2, LE) | BODY | FOOTER(4)` where
//! `LENGTH` counts the body bytes. Command and ack frames use the `FD FC FB FA` /
//! `04 03 02 01` markers; telemetry reports use `F4 F3 F2 F1` / `F8 F7 F6 F5`.

use heapless::Vec;
use log::debug;

use crate::{
    Error, ACK_BUFFER_SIZE, ACK_COMMAND_IDX, ACK_LENGTH_IDX, ACK_LENGTH_OFFSET, ACK_MARKER,
    ACK_MARKER_IDX, ACK_RESULT_IDX, ACK_SPACER_IDX, ACK_STATUS_IDX, CMD_FOOTER, CMD_HEADER,
    FRAME_OVERHEAD, MAX_FRAME_SIZE, SPACER, TELEMETRY_FOOTER, TELEMETRY_HEADER,
};

/// A fully framed command, ready to be written to the serial link.
pub type CommandFrame = Vec<u8, MAX_FRAME_SIZE>;

/// Which pair of frame markers a frame uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host commands and the sensor's acks.
    Command,
    /// Periodic reports streamed by the sensor.
    Telemetry,
}

impl Direction {
    pub fn header(self) -> &'static [u8; 4] {
        match self {
            Direction::Command => &CMD_HEADER,
            Direction::Telemetry => &TELEMETRY_HEADER,
        }
    }

    pub fn footer(self) -> &'static [u8; 4] {
        match self {
            Direction::Command => &CMD_FOOTER,
            Direction::Telemetry => &TELEMETRY_FOOTER,
        }
    }
}

/// Builds a command frame: header, LE length of `1 + payload.len()`, command id,
/// payload, footer.
///
/// Device-imposed payload limits are not checked here. A payload that does not fit
/// the outbound buffer is an [`Error::BufferOverrun`].
pub fn build_frame(command_id: u8, payload: &[u8]) -> Result<CommandFrame, Error> {
    let body_len = 1 + payload.len();
    let len = u16::try_from(body_len).map_err(|_| Error::BufferOverrun)?;

    let mut frame = CommandFrame::new();
    let fits = frame.extend_from_slice(&CMD_HEADER).is_ok()
        && frame.extend_from_slice(&len.to_le_bytes()).is_ok()
        && frame.push(command_id).is_ok()
        && frame.extend_from_slice(payload).is_ok()
        && frame.extend_from_slice(&CMD_FOOTER).is_ok();
    if !fits {
        log::error!(
            "Command {:02X} with {} payload bytes exceeds frame capacity {}",
            command_id,
            payload.len(),
            MAX_FRAME_SIZE
        );
        return Err(Error::BufferOverrun);
    }
    Ok(frame)
}

/// A frame whose markers and length field were checked by [`decode_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef<'a> {
    body: &'a [u8],
}

impl<'a> FrameRef<'a> {
    /// All bytes covered by the length field.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// First body byte: the command id for command frames, the report type for telemetry.
    pub fn command_id(&self) -> u8 {
        self.body[0]
    }

    /// Body bytes after the command id.
    pub fn payload(&self) -> &'a [u8] {
        &self.body[1..]
    }
}

/// Splits a complete frame into its body, checking header, footer and length field.
pub fn decode_frame(bytes: &[u8], direction: Direction) -> Result<FrameRef<'_>, Error> {
    if bytes.len() < FRAME_OVERHEAD + 1 {
        return Err(Error::MalformedFrame);
    }
    let (header, rest) = bytes.split_at(4);
    if header != direction.header() {
        return Err(Error::MalformedFrame);
    }
    let body_len = usize::from(u16::from_le_bytes([rest[0], rest[1]]));
    if body_len == 0 || FRAME_OVERHEAD + body_len != bytes.len() {
        return Err(Error::MalformedFrame);
    }
    let body = &rest[2..2 + body_len];
    if &rest[2 + body_len..] != direction.footer() {
        return Err(Error::MalformedFrame);
    }
    Ok(FrameRef { body })
}

/// Checks a captured ack against the command that should have produced it.
///
/// Every offset is fixed: header at 0-3, `expected_len - 12` at 4, spacer at 5,
/// the echoed command id at 6, the ack marker at 7 and the footer in the last 4
/// positions of `expected_len`. A single mismatching byte rejects the whole frame.
pub fn validate_ack(buf: &[u8], expected_id: u8, expected_len: usize) -> Result<(), Error> {
    if expected_len < ACK_RESULT_IDX + CMD_FOOTER.len() || buf.len() != expected_len {
        return Err(Error::MalformedFrame);
    }
    let length_byte = u8::try_from(expected_len)
        .ok()
        .and_then(|len| len.checked_sub(ACK_LENGTH_OFFSET))
        .ok_or(Error::MalformedFrame)?;

    let footer_start = expected_len - CMD_FOOTER.len();
    let valid = buf[..4] == CMD_HEADER
        && buf[ACK_LENGTH_IDX] == length_byte
        && buf[ACK_SPACER_IDX] == SPACER
        && buf[ACK_COMMAND_IDX] == expected_id
        && buf[ACK_MARKER_IDX] == ACK_MARKER
        && (footer_start..expected_len).all(|i| buf[i] == CMD_FOOTER[i - footer_start]);

    if valid {
        Ok(())
    } else {
        debug!(
            "Ack for {:02X} rejected, expected {} bytes: {:02X?}",
            expected_id, expected_len, buf
        );
        Err(Error::MalformedFrame)
    }
}

/// A validated acknowledgement.
///
/// The status byte sits at offset 8; result fields start at offset 10 and end
/// before the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRecord {
    raw: Vec<u8, ACK_BUFFER_SIZE>,
}

impl AckRecord {
    /// Validates `buf` and copies it into a new record.
    pub fn parse(buf: &[u8], expected_id: u8, expected_len: usize) -> Result<Self, Error> {
        validate_ack(buf, expected_id, expected_len)?;
        let raw = Vec::from_slice(buf).map_err(|_| Error::BufferOverrun)?;
        Ok(AckRecord { raw })
    }

    pub fn command_id(&self) -> u8 {
        self.raw[ACK_COMMAND_IDX]
    }

    /// `0` means the command succeeded.
    pub fn status(&self) -> u8 {
        self.raw[ACK_STATUS_IDX]
    }

    pub fn is_success(&self) -> bool {
        self.status() == 0x00
    }

    /// Result fields between the status word and the footer.
    pub fn payload(&self) -> &[u8] {
        &self.raw[ACK_RESULT_IDX..self.raw.len() - CMD_FOOTER.len()]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}
