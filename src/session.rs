use embedded_io_async::{Read, ReadReady, Write};
use heapless::Vec;
use log::{debug, warn};

use crate::{
    AckRecord, BasicParams, BaudRate, Clock, Error, GateSensitivity, Ld2412,
    BASIC_PARAMS_ACK_LEN, DISABLE_CONFIG, ENABLE_CONFIG, ENABLE_CONFIG_ACK_LEN, FACTORY_RESET,
    GATE_COUNT, GET_BASIC_PARAMS, GET_MOTION_SENSITIVITY, GET_STATIC_SENSITIVITY,
    MAX_PAYLOAD_SIZE, RESTART, SENSITIVITY_ACK_LEN, SET_BASIC_PARAMS, SET_BAUD_RATE,
    SET_MOTION_SENSITIVITY, SET_STATIC_SENSITIVITY, SPACER, STATUS_ACK_LEN,
};

/// A command id, its payload and the total length of the ack it produces.
///
/// Payloads start with the high byte of the 16-bit command word (`0x00`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    id: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    ack_len: usize,
}

impl Command {
    /// Builds an arbitrary command. Fails if `payload` does not fit a frame.
    pub fn new(id: u8, payload: &[u8], ack_len: usize) -> Result<Self, Error> {
        let payload = Vec::from_slice(payload).map_err(|_| Error::BufferOverrun)?;
        Ok(Command {
            id,
            payload,
            ack_len,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn ack_len(&self) -> usize {
        self.ack_len
    }

    pub fn enable_config() -> Result<Self, Error> {
        Self::new(ENABLE_CONFIG, &[SPACER, 0x01, 0x00], ENABLE_CONFIG_ACK_LEN)
    }

    pub fn disable_config() -> Result<Self, Error> {
        Self::new(DISABLE_CONFIG, &[SPACER], STATUS_ACK_LEN)
    }

    pub fn factory_reset() -> Result<Self, Error> {
        Self::new(FACTORY_RESET, &[SPACER], STATUS_ACK_LEN)
    }

    pub fn restart() -> Result<Self, Error> {
        Self::new(RESTART, &[SPACER], STATUS_ACK_LEN)
    }

    pub fn set_basic_params(params: BasicParams) -> Result<Self, Error> {
        params.validate()?;
        let mut payload = [SPACER; 6];
        payload[1..].copy_from_slice(&params.to_fields());
        Self::new(SET_BASIC_PARAMS, &payload, STATUS_ACK_LEN)
    }

    pub fn set_motion_sensitivity(gates: &GateSensitivity) -> Result<Self, Error> {
        Self::sensitivity(SET_MOTION_SENSITIVITY, gates)
    }

    pub fn set_static_sensitivity(gates: &GateSensitivity) -> Result<Self, Error> {
        Self::sensitivity(SET_STATIC_SENSITIVITY, gates)
    }

    fn sensitivity(id: u8, gates: &GateSensitivity) -> Result<Self, Error> {
        gates.validate()?;
        let mut payload = [SPACER; 1 + GATE_COUNT];
        payload[1..].copy_from_slice(gates.gates());
        Self::new(id, &payload, STATUS_ACK_LEN)
    }

    pub fn set_baud_rate(baud: BaudRate) -> Result<Self, Error> {
        Self::new(SET_BAUD_RATE, &[SPACER, baud.index(), 0x00], STATUS_ACK_LEN)
    }

    pub fn get_basic_params() -> Result<Self, Error> {
        Self::new(GET_BASIC_PARAMS, &[SPACER], BASIC_PARAMS_ACK_LEN)
    }

    pub fn get_motion_sensitivity() -> Result<Self, Error> {
        Self::new(GET_MOTION_SENSITIVITY, &[SPACER], SENSITIVITY_ACK_LEN)
    }

    pub fn get_static_sensitivity() -> Result<Self, Error> {
        Self::new(GET_STATIC_SENSITIVITY, &[SPACER], SENSITIVITY_ACK_LEN)
    }
}

impl<S, C> Ld2412<S, C>
where
    S: Read + Write + ReadReady,
    C: Clock,
{
    // One command round trip: write, await the ack, check its status.
    async fn transact(&mut self, command: &Command) -> Result<AckRecord, Error> {
        self.write_frame(command.id(), command.payload()).await?;
        let ack = self.await_ack(command.id(), command.ack_len()).await?;
        if !ack.is_success() {
            log::error!(
                "Command {:02X} rejected with status {:02X}",
                command.id(),
                ack.status()
            );
            return Err(Error::DeviceRejected(ack.status()));
        }
        Ok(ack)
    }

    /// Runs `command` inside configuration mode.
    ///
    /// Configuration mode is entered first; if the sensor does not acknowledge that,
    /// `command` is never sent. Leaving configuration mode is always attempted
    /// afterwards, even when `command` failed. A failure to leave is logged and kept
    /// in [`Ld2412::last_cleanup_error`] but does not change the returned result.
    ///
    /// # Returns
    ///
    /// * `Ok(AckRecord)` with the validated, successful ack of `command`.
    /// * `Err(Error)` from entering configuration mode or from `command` itself.
    pub async fn execute(&mut self, command: &Command) -> Result<AckRecord, Error> {
        let enter = Command::enable_config()?;
        self.transact(&enter).await.map_err(|e| {
            log::error!("Failed to enter configuration mode: {:?}", e);
            e
        })?;

        let result = self.transact(command).await;

        match self.leave_config_mode().await {
            Ok(()) => self.last_cleanup_error = None,
            Err(e) => {
                warn!("Failed to leave configuration mode: {:?}", e);
                self.last_cleanup_error = Some(e);
            }
        }
        result
    }

    async fn leave_config_mode(&mut self) -> Result<(), Error> {
        let leave = Command::disable_config()?;
        self.transact(&leave).await.map(|_| ())
    }

    /// Restores factory settings.
    pub async fn reset_device_settings(&mut self) -> Result<(), Error> {
        debug!("Restoring factory settings (CMD 0xA2)");
        self.execute(&Command::factory_reset()?).await.map(|_| ())
    }

    /// Restarts the module.
    pub async fn restart_module(&mut self) -> Result<(), Error> {
        debug!("Restarting module (CMD 0xA3)");
        self.execute(&Command::restart()?).await.map(|_| ())
    }

    /// Sets the gate range, unmanned duration and OUT pin polarity.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the sensor acknowledged the change.
    /// * `Err(Error::UnsupportedParameter)` if the gate range is invalid. Nothing is sent.
    /// * `Err(Error)` for any other failure of the exchange.
    pub async fn set_basic_params(&mut self, params: BasicParams) -> Result<(), Error> {
        let command = Command::set_basic_params(params)?;
        debug!("Setting basic parameters: {:?}", params);
        self.execute(&command).await.map(|_| ())
    }

    /// Sets the same motion sensitivity (0-100) on every gate.
    pub async fn set_motion_sensitivity(&mut self, sensitivity: u8) -> Result<(), Error> {
        self.set_motion_sensitivity_gates(&GateSensitivity::uniform(sensitivity))
            .await
    }

    /// Sets the motion sensitivity of each gate individually.
    ///
    /// Detections only count as presence when their energy is above the sensitivity
    /// of the gate they fall in.
    pub async fn set_motion_sensitivity_gates(
        &mut self,
        gates: &GateSensitivity,
    ) -> Result<(), Error> {
        let command = Command::set_motion_sensitivity(gates)?;
        debug!("Setting motion sensitivity: {:?}", gates.gates());
        self.execute(&command).await.map(|_| ())
    }

    /// Sets the same static sensitivity (0-100) on every gate.
    pub async fn set_static_sensitivity(&mut self, sensitivity: u8) -> Result<(), Error> {
        self.set_static_sensitivity_gates(&GateSensitivity::uniform(sensitivity))
            .await
    }

    /// Sets the static sensitivity of each gate individually.
    pub async fn set_static_sensitivity_gates(
        &mut self,
        gates: &GateSensitivity,
    ) -> Result<(), Error> {
        let command = Command::set_static_sensitivity(gates)?;
        debug!("Setting static sensitivity: {:?}", gates.gates());
        self.execute(&command).await.map(|_| ())
    }

    /// Sets the UART baud rate of the sensor.
    ///
    /// The new rate takes effect after the module restarts.
    ///
    /// # Arguments
    ///
    /// * `baud`: One of 9600, 19200, 38400, 57600, 115200, 230400, 256000 or 460800.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the sensor acknowledged the change.
    /// * `Err(Error::UnsupportedParameter)` for any other rate. Nothing is sent.
    pub async fn set_baud_rate(&mut self, baud: u32) -> Result<(), Error> {
        let rate = BaudRate::try_from(baud).map_err(|e| {
            log::error!("Unsupported baud rate {}", baud);
            e
        })?;
        debug!("Setting baud rate to {} (index {})", baud, rate.index());
        self.execute(&Command::set_baud_rate(rate)?).await.map(|_| ())
    }

    /// Reads the gate range, unmanned duration and OUT pin polarity.
    pub async fn get_basic_params(&mut self) -> Result<BasicParams, Error> {
        let ack = self.execute(&Command::get_basic_params()?).await?;
        let fields: [u8; 5] = ack
            .payload()
            .get(..5)
            .and_then(|f| f.try_into().ok())
            .ok_or(Error::MalformedFrame)?;
        let params = BasicParams::from_fields(fields);
        debug!("Queried basic parameters: {:?}", params);
        Ok(params)
    }

    /// Reads the motion sensitivity of all 14 gates.
    ///
    /// Use [`GateSensitivity::min`] for the lowest value across gates.
    pub async fn get_motion_sensitivity(&mut self) -> Result<GateSensitivity, Error> {
        self.query_sensitivity(Command::get_motion_sensitivity()?).await
    }

    /// Reads the static sensitivity of all 14 gates.
    pub async fn get_static_sensitivity(&mut self) -> Result<GateSensitivity, Error> {
        self.query_sensitivity(Command::get_static_sensitivity()?).await
    }

    async fn query_sensitivity(&mut self, command: Command) -> Result<GateSensitivity, Error> {
        let ack = self.execute(&command).await?;
        let gates: [u8; GATE_COUNT] = ack
            .payload()
            .get(..GATE_COUNT)
            .and_then(|g| g.try_into().ok())
            .ok_or(Error::MalformedFrame)?;
        debug!("Queried sensitivity (CMD {:02X}): {:?}", command.id(), gates);
        Ok(GateSensitivity::new(gates))
    }
}
