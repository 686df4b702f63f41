// CMD_HEADER marks the beginning of a command frame sent to the sensor or an ack received from it.
pub const CMD_HEADER: [u8; 4] = [0xFD, 0xFC, 0xFB, 0xFA];

// CMD_FOOTER marks the end of a command or ack frame.
pub const CMD_FOOTER: [u8; 4] = [0x04, 0x03, 0x02, 0x01];

// TELEMETRY_HEADER marks the beginning of a periodic report frame streamed by the sensor
// while it is not in configuration mode.
pub const TELEMETRY_HEADER: [u8; 4] = [0xF4, 0xF3, 0xF2, 0xF1];

// TELEMETRY_FOOTER marks the end of a periodic report frame.
pub const TELEMETRY_FOOTER: [u8; 4] = [0xF8, 0xF7, 0xF6, 0xF5];

// Header + 2-byte length + footer.
pub const FRAME_OVERHEAD: usize = 10;

// Second byte of every ack length field and first byte of every command payload
// (high byte of the 16-bit command word).
pub const SPACER: u8 = 0x00;

// ACK_MARKER is the byte following the echoed command id in every ack.
pub const ACK_MARKER: u8 = 0x01;

// The ack length byte is checked against the expected total length minus this value.
pub const ACK_LENGTH_OFFSET: u8 = 12;

// Offsets inside an ack frame.
pub const ACK_LENGTH_IDX: usize = 4;
pub const ACK_SPACER_IDX: usize = 5;
pub const ACK_COMMAND_IDX: usize = 6;
pub const ACK_MARKER_IDX: usize = 7;
pub const ACK_STATUS_IDX: usize = 8;
pub const ACK_RESULT_IDX: usize = 10;

// Capacity of the ack capture buffer.
pub const ACK_BUFFER_SIZE: usize = 32;

// Capacity of an outbound command frame, command id included.
pub const MAX_FRAME_SIZE: usize = 32;

// Largest command payload that still fits an outbound frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - FRAME_OVERHEAD - 1;

// Command ids.
pub const ENABLE_CONFIG: u8 = 0xFF;
pub const DISABLE_CONFIG: u8 = 0xFE;
pub const FACTORY_RESET: u8 = 0xA2;
pub const RESTART: u8 = 0xA3;
pub const SET_BASIC_PARAMS: u8 = 0x02;
pub const SET_MOTION_SENSITIVITY: u8 = 0x03;
pub const SET_STATIC_SENSITIVITY: u8 = 0x04;
pub const SET_BAUD_RATE: u8 = 0x05;
pub const GET_BASIC_PARAMS: u8 = 0x12;
pub const GET_MOTION_SENSITIVITY: u8 = 0x13;
pub const GET_STATIC_SENSITIVITY: u8 = 0x14;

// Expected total ack lengths, header and footer included.
pub const ENABLE_CONFIG_ACK_LEN: usize = 18;
pub const STATUS_ACK_LEN: usize = 14;
pub const BASIC_PARAMS_ACK_LEN: usize = 19;
pub const SENSITIVITY_ACK_LEN: usize = 28;

// Number of distance gates reported by the sensor.
pub const GATE_COUNT: usize = 14;

// Highest accepted sensitivity value for a gate.
pub const MAX_SENSITIVITY: u8 = 100;

// Fixed length of a telemetry frame.
pub const TELEMETRY_FRAME_LEN: usize = 21;

// Offsets inside a telemetry frame.
pub const TARGET_STATE_IDX: usize = 8;
pub const MOVING_DISTANCE_IDX: usize = 9;
pub const MOVING_ENERGY_IDX: usize = 11;
pub const STATIC_DISTANCE_IDX: usize = 12;
pub const STATIC_ENERGY_IDX: usize = 14;
pub const TELEMETRY_FOOTER_IDX: usize = TELEMETRY_FRAME_LEN - 4;
