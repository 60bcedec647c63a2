//! iBUS wire format: servo frames in, sensor queries in, sensor responses out.
//!
//! Every frame is checksummed the same way: start at `0xFFFF`, subtract each
//! byte before the trailer, send the result little-endian.

use heapless::Vec;

use crate::state::{ChannelSet, CHANNEL_COUNT};

pub const SERVO_HEADER: [u8; 2] = [0x20, 0x40];
/// Header + 14 channel pairs + checksum pair.
pub const SERVO_FRAME_LEN: usize = 2 + 2 * CHANNEL_COUNT + 2;

pub const QUERY_LEN: u8 = 4;
pub const RESPONSE_MAX: usize = 8;

pub const CMD_PROBE: u8 = 0x80;
pub const CMD_TYPE: u8 = 0x90;
pub const CMD_VALUE: u8 = 0xA0;

pub type Response = Vec<u8, RESPONSE_MAX>;

/// Why a frame was discarded. Never reported on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Trailer does not match the running sum.
    BadChecksum,
    /// Query length byte is not [`QUERY_LEN`].
    BadLength,
    /// Servo header seen before the previous frame completed.
    Resync,
    /// Sensor index 0 is reserved for the receiver itself.
    ReservedSensor,
    /// Index out of range or sensor not installed.
    NoSuchSensor,
    UnknownCommand,
    /// Declared payload width is neither 2 nor 4 bytes.
    UnsupportedWidth,
}

/// Result of feeding one byte to a parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parse<T> {
    Pending,
    Done(T),
    Dropped(FrameError),
}

pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0xFFFF_u16, |sum, &b| sum.wrapping_sub(b as u16))
}

// ── Servo frames ──────────────────────────────────────────────────────────────

/// Byte position meaning "waiting for a header".
const SERVO_IDLE: u8 = (SERVO_FRAME_LEN - 2) as u8;
const SERVO_SUM_SEED: u16 = 0xFFFF - SERVO_HEADER[0] as u16 - SERVO_HEADER[1] as u16;

/// Incremental servo frame parser.
///
/// Channel values are staged privately and only handed out once the trailer
/// matches, so a corrupted frame never leaks partial values.
pub struct ServoParser {
    prev: u8,
    last: u8,
    pos: u8,
    sum: u16,
    staged: [i32; CHANNEL_COUNT],
}

impl ServoParser {
    pub const fn new() -> Self {
        Self {
            prev: 0,
            last: 0,
            pos: SERVO_IDLE,
            sum: SERVO_SUM_SEED,
            staged: [0; CHANNEL_COUNT],
        }
    }

    pub fn push_byte(&mut self, b: u8) -> Parse<ChannelSet> {
        self.prev = self.last;
        self.last = b;

        if self.prev == SERVO_HEADER[0] && b == SERVO_HEADER[1] {
            let interrupted = self.pos != SERVO_IDLE;
            self.pos = 0;
            self.sum = SERVO_SUM_SEED;
            return if interrupted {
                Parse::Dropped(FrameError::Resync)
            } else {
                Parse::Pending
            };
        }
        if self.pos == SERVO_IDLE {
            return Parse::Pending;
        }

        self.pos += 1;
        if self.pos & 1 == 1 {
            return Parse::Pending;
        }

        let value = u16::from_le_bytes([self.prev, b]);
        if self.pos == SERVO_IDLE {
            if value != self.sum {
                return Parse::Dropped(FrameError::BadChecksum);
            }
            return Parse::Done(ChannelSet {
                channels: self.staged,
            });
        }

        self.staged[(self.pos as usize >> 1) - 1] = (value & 0x0FFF) as i32;
        self.sum = self
            .sum
            .wrapping_sub(self.prev as u16 + b as u16);
        Parse::Pending
    }

    /// Forget any partial frame and wait for the next header.
    pub fn reset(&mut self) {
        self.pos = SERVO_IDLE;
        self.sum = SERVO_SUM_SEED;
    }
}

impl Default for ServoParser {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sensor queries ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Probe,
    Type,
    Value,
}

/// A checksum-valid 4-byte sensor query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Query {
    bytes: [u8; QUERY_LEN as usize],
}

impl Query {
    /// Address/command byte, echoed in every response.
    pub fn address(&self) -> u8 {
        self.bytes[1]
    }

    /// Zero-based sensor index, `None` for the reserved address 0.
    pub fn sensor_index(&self) -> Option<usize> {
        (self.address() & 0x0F).checked_sub(1).map(usize::from)
    }

    pub fn command(&self) -> Option<Command> {
        match self.address() & 0xF0 {
            CMD_PROBE => Some(Command::Probe),
            CMD_TYPE => Some(Command::Type),
            CMD_VALUE => Some(Command::Value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Incremental query parser for the half-duplex window.
pub struct QueryParser {
    bytes: [u8; QUERY_LEN as usize],
    pos: usize,
}

impl QueryParser {
    pub const fn new() -> Self {
        Self {
            bytes: [0; QUERY_LEN as usize],
            pos: 0,
        }
    }

    pub fn push_byte(&mut self, b: u8) -> Parse<Query> {
        self.bytes[self.pos] = b;
        self.pos += 1;
        if self.pos < self.bytes.len() {
            return Parse::Pending;
        }
        self.pos = 0;

        if self.bytes[0] != QUERY_LEN {
            return Parse::Dropped(FrameError::BadLength);
        }
        let received = u16::from_le_bytes([self.bytes[2], self.bytes[3]]);
        if received != checksum(&self.bytes[..2]) {
            return Parse::Dropped(FrameError::BadChecksum);
        }
        Parse::Done(Query { bytes: self.bytes })
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Acknowledge a probe by echoing the query unchanged.
pub fn probe_echo(query: &Query) -> Response {
    let mut buf = Response::new();
    // Capacity 8 > 4
    let _ = buf.extend_from_slice(query.as_bytes());
    buf
}

/// Build `[len] [address] [payload...] [checksum lo] [checksum hi]`.
///
/// Returns an empty buffer if the payload does not fit.
pub fn build_response(address: u8, payload: &[u8]) -> Response {
    let mut buf = Response::new();
    let len = 4 + payload.len();
    if len > RESPONSE_MAX {
        return buf;
    }

    let _ = buf.push(len as u8);
    let _ = buf.push(address);
    let _ = buf.extend_from_slice(payload);
    let sum = checksum(&buf);
    let _ = buf.extend_from_slice(&sum.to_le_bytes());
    buf
}

pub fn type_response(address: u8, type_code: u16) -> Response {
    build_response(address, &type_code.to_le_bytes())
}

/// Value response truncated to the sensor's declared width (2 or 4 bytes).
pub fn value_response(address: u8, value: i32, width: usize) -> Result<Response, FrameError> {
    let bytes = value.to_le_bytes();
    match width {
        2 | 4 => Ok(build_response(address, &bytes[..width])),
        _ => Err(FrameError::UnsupportedWidth),
    }
}

/// Encode a full servo frame. Used by tests and bench tooling.
pub fn encode_servo_frame(channels: &[u16; CHANNEL_COUNT]) -> [u8; SERVO_FRAME_LEN] {
    let mut frame = [0u8; SERVO_FRAME_LEN];
    frame[..2].copy_from_slice(&SERVO_HEADER);
    for (i, ch) in channels.iter().enumerate() {
        frame[2 + 2 * i..4 + 2 * i].copy_from_slice(&ch.to_le_bytes());
    }
    let sum = checksum(&frame[..SERVO_FRAME_LEN - 2]);
    frame[SERVO_FRAME_LEN - 2..].copy_from_slice(&sum.to_le_bytes());
    frame
}

/// Encode a sensor query for `address`.
pub fn encode_query(address: u8) -> [u8; QUERY_LEN as usize] {
    let sum = checksum(&[QUERY_LEN, address]).to_le_bytes();
    [QUERY_LEN, address, sum[0], sum[1]]
}
