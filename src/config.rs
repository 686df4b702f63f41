use crate::{Error, GATE_COUNT, MAX_SENSITIVITY, SPACER};

/// Configuration settings for the LD2412 driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long to wait for a complete ack after a command is written, in milliseconds.
    pub ack_timeout_ms: u64,
    /// Deadline for capturing one telemetry frame, in milliseconds.
    pub capture_timeout_ms: u64,
    /// Minimum age of the cached telemetry frame before the serial link is read again.
    pub refresh_interval_ms: u64,
}

impl Config {
    /// Creates a new `Config` instance.
    ///
    /// # Arguments
    ///
    /// * `ack_timeout_ms` - Ack wait deadline in milliseconds.
    /// * `capture_timeout_ms` - Telemetry capture deadline in milliseconds.
    /// * `refresh_interval_ms` - Telemetry debounce interval in milliseconds.
    pub fn new(ack_timeout_ms: u64, capture_timeout_ms: u64, refresh_interval_ms: u64) -> Config {
        Config {
            ack_timeout_ms,
            capture_timeout_ms,
            refresh_interval_ms,
        }
    }
    /// Sets the ack timeout.
    pub fn ack_timeout_ms(mut self, timeout: u64) -> Self {
        self.ack_timeout_ms = timeout;
        self
    }
    /// Sets the telemetry capture timeout.
    pub fn capture_timeout_ms(mut self, timeout: u64) -> Self {
        self.capture_timeout_ms = timeout;
        self
    }
    /// Sets the telemetry refresh interval. A value of `0` captures on every read.
    pub fn refresh_interval_ms(mut self, interval: u64) -> Self {
        self.refresh_interval_ms = interval;
        self
    }
}

impl Default for Config {
    /// The default configuration waits 200 ms for acks and telemetry and reuses
    /// a telemetry frame for up to 1 s.
    fn default() -> Config {
        Config {
            ack_timeout_ms: 200,
            capture_timeout_ms: 200,
            refresh_interval_ms: 1000,
        }
    }
}

/// UART baud rates supported by the sensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
    B230400,
    B256000,
    B460800,
}

impl BaudRate {
    /// Index sent on the wire to select this rate.
    pub fn index(self) -> u8 {
        match self {
            BaudRate::B9600 => 0x01,
            BaudRate::B19200 => 0x02,
            BaudRate::B38400 => 0x03,
            BaudRate::B57600 => 0x04,
            BaudRate::B115200 => 0x05,
            BaudRate::B230400 => 0x06,
            BaudRate::B256000 => 0x07,
            BaudRate::B460800 => 0x08,
        }
    }

    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
            BaudRate::B256000 => 256000,
            BaudRate::B460800 => 460800,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(baud: u32) -> Result<Self, Self::Error> {
        match baud {
            9600 => Ok(BaudRate::B9600),
            19200 => Ok(BaudRate::B19200),
            38400 => Ok(BaudRate::B38400),
            57600 => Ok(BaudRate::B57600),
            115200 => Ok(BaudRate::B115200),
            230400 => Ok(BaudRate::B230400),
            256000 => Ok(BaudRate::B256000),
            460800 => Ok(BaudRate::B460800),
            _ => Err(Error::UnsupportedParameter),
        }
    }
}

/// Level of the OUT pin while a target is present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutPinPolarity {
    /// OUT is driven high while someone is present.
    ActiveHigh,
    /// OUT is driven low while someone is present.
    ActiveLow,
}

impl OutPinPolarity {
    fn to_u8(self) -> u8 {
        match self {
            OutPinPolarity::ActiveHigh => 0x00,
            OutPinPolarity::ActiveLow => 0x01,
        }
    }

    fn from_u8(value: u8) -> Self {
        if value == 0x00 {
            OutPinPolarity::ActiveHigh
        } else {
            OutPinPolarity::ActiveLow
        }
    }
}

/// Basic detection parameters of the sensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BasicParams {
    /// Nearest distance gate that reports presence.
    pub min_gate: u8,
    /// Farthest distance gate that reports presence.
    pub max_gate: u8,
    /// Seconds the sensor keeps reporting presence after the target left.
    pub unmanned_duration: u8,
    /// Byte between the duration and the polarity. Always written as `0x00`.
    pub reserved: u8,
    pub out_pin_polarity: OutPinPolarity,
}

impl BasicParams {
    /// Creates a new parameter set.
    ///
    /// # Arguments
    ///
    /// * `min_gate` - Nearest gate (0-14).
    /// * `max_gate` - Farthest gate (0-14), not below `min_gate`.
    /// * `unmanned_duration` - Hold time in seconds.
    /// * `out_pin_polarity` - OUT pin level on presence.
    pub fn new(
        min_gate: u8,
        max_gate: u8,
        unmanned_duration: u8,
        out_pin_polarity: OutPinPolarity,
    ) -> Self {
        BasicParams {
            min_gate,
            max_gate,
            unmanned_duration,
            reserved: 0x00,
            out_pin_polarity,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.min_gate > self.max_gate || usize::from(self.max_gate) > GATE_COUNT {
            log::error!(
                "Gate range {}..={} out of range (0-{})",
                self.min_gate,
                self.max_gate,
                GATE_COUNT
            );
            return Err(Error::UnsupportedParameter);
        }
        Ok(())
    }

    // Wire order: min gate, max gate, duration, reserved, polarity.
    pub(crate) fn to_fields(self) -> [u8; 5] {
        [
            self.min_gate,
            self.max_gate,
            self.unmanned_duration,
            SPACER,
            self.out_pin_polarity.to_u8(),
        ]
    }

    pub(crate) fn from_fields(fields: [u8; 5]) -> Self {
        BasicParams {
            min_gate: fields[0],
            max_gate: fields[1],
            unmanned_duration: fields[2],
            reserved: fields[3],
            out_pin_polarity: OutPinPolarity::from_u8(fields[4]),
        }
    }
}

/// Per-gate sensitivity values (0-100) for the 14 distance gates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GateSensitivity([u8; GATE_COUNT]);

impl GateSensitivity {
    pub fn new(gates: [u8; GATE_COUNT]) -> Self {
        GateSensitivity(gates)
    }

    /// Same sensitivity on every gate.
    pub fn uniform(value: u8) -> Self {
        GateSensitivity([value; GATE_COUNT])
    }

    pub fn gates(&self) -> &[u8; GATE_COUNT] {
        &self.0
    }

    pub fn get(&self, gate: usize) -> Option<u8> {
        self.0.get(gate).copied()
    }

    /// Lowest sensitivity across all gates.
    pub fn min(&self) -> u8 {
        self.0.iter().copied().min().unwrap_or(0)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if let Some(value) = self.0.iter().find(|&&v| v > MAX_SENSITIVITY) {
            log::error!("Sensitivity {} out of range (0-{})", value, MAX_SENSITIVITY);
            return Err(Error::UnsupportedParameter);
        }
        Ok(())
    }
}
