use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No valid frame was assembled before the deadline.
    Timeout,
    /// Header, footer, length or marker mismatch.
    MalformedFrame,
    /// More bytes than the fixed capture buffer can hold.
    BufferOverrun,
    /// Argument rejected before any I/O.
    UnsupportedParameter,
    /// The ack was well-formed but carried a nonzero status byte.
    DeviceRejected(u8),
    ReadFailure,
    WriteFailure,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout => f.write_str("timed out waiting for a frame"),
            Error::MalformedFrame => f.write_str("malformed frame"),
            Error::BufferOverrun => f.write_str("capture buffer overrun"),
            Error::UnsupportedParameter => f.write_str("unsupported parameter"),
            Error::DeviceRejected(status) => {
                write!(f, "device rejected command (status {:#04x})", status)
            }
            Error::ReadFailure => f.write_str("serial read failure"),
            Error::WriteFailure => f.write_str("serial write failure"),
        }
    }
}
