//! Wire-direction state machine for the shared servo/telemetry line.
//!
//! 1. Full duplex, RX pin only: wait for a servo frame.
//! 2. On a valid frame, publish the channels and switch to half duplex to
//!    listen for sensor queries on the single wire.
//! 3. On an answerable query, buffer the response and transmit it. Enabling
//!    the transmitter produces the idle frame the receiver expects before a
//!    response.
//! 4. After the last byte has physically left, release the wire and listen
//!    again.
//! 5. The turnaround timer (armed on every servo frame) forces full duplex
//!    again from any half-duplex state.
//!
//! Handlers only update state and report what the hardware must do; the
//! [`crate::controller::Controller`] applies those effects.

use crate::drivers::ibus::{
    self, Command, FrameError, Parse, Query, QueryParser, Response, ServoParser,
};
use crate::hal::Acquisition;
use crate::sensor::FilteredSensors;
use crate::state::ChannelSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    FullDuplexListening,
    HalfDuplexListening,
    HalfDuplexTransmitting,
    HalfDuplexTrailing,
}

/// Outcome of a received byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Received {
    /// Mid-frame, or the receiver is not listening.
    Pending,
    /// New channel values are published: mix, arm the turnaround timer and
    /// switch the line to half duplex.
    ServoFrame,
    /// A response is buffered: enable the transmitter.
    Respond,
    /// Frame discarded; state unchanged.
    Dropped(FrameError),
}

/// Outcome of a transmit-empty event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sent {
    /// Write this byte; more follow.
    More(u8),
    /// Write this byte, then wait for transmit-complete.
    Last(u8),
}

pub struct Link {
    state: LinkState,
    servo: ServoParser,
    query: QueryParser,
    channels: ChannelSet,
    response: Response,
    cursor: usize,
}

impl Link {
    pub const fn new() -> Self {
        Self {
            state: LinkState::FullDuplexListening,
            servo: ServoParser::new(),
            query: QueryParser::new(),
            channels: ChannelSet {
                channels: [0; crate::state::CHANNEL_COUNT],
            },
            response: Response::new(),
            cursor: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Channel values from the last valid servo frame.
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Bytes of the response currently buffered for transmission.
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    pub fn on_byte_received<A: Acquisition>(
        &mut self,
        byte: u8,
        sensors: &mut FilteredSensors<A>,
    ) -> Received {
        match self.state {
            LinkState::FullDuplexListening => match self.servo.push_byte(byte) {
                Parse::Pending => Received::Pending,
                Parse::Dropped(e) => Received::Dropped(e),
                Parse::Done(channels) => {
                    self.channels = channels;
                    self.query.reset();
                    self.state = LinkState::HalfDuplexListening;
                    Received::ServoFrame
                }
            },
            LinkState::HalfDuplexListening => match self.query.push_byte(byte) {
                Parse::Pending => Received::Pending,
                Parse::Dropped(e) => Received::Dropped(e),
                Parse::Done(query) => match answer(&query, sensors) {
                    Ok(response) => {
                        self.response = response;
                        self.cursor = 0;
                        self.state = LinkState::HalfDuplexTransmitting;
                        Received::Respond
                    }
                    Err(e) => Received::Dropped(e),
                },
            },
            // Receiver is disabled while we own the wire.
            LinkState::HalfDuplexTransmitting | LinkState::HalfDuplexTrailing => Received::Pending,
        }
    }

    /// Next byte for the transmitter, `None` outside a transmission.
    pub fn on_byte_sent(&mut self) -> Option<Sent> {
        if self.state != LinkState::HalfDuplexTransmitting {
            return None;
        }
        let byte = *self.response.get(self.cursor)?;
        self.cursor += 1;
        if self.cursor < self.response.len() {
            return Some(Sent::More(byte));
        }
        self.state = LinkState::HalfDuplexTrailing;
        Some(Sent::Last(byte))
    }

    /// Returns `true` if the wire should go back to half-duplex receive.
    pub fn on_transmit_complete(&mut self) -> bool {
        if self.state != LinkState::HalfDuplexTrailing {
            return false;
        }
        self.state = LinkState::HalfDuplexListening;
        self.query.reset();
        true
    }

    pub fn on_timeout(&mut self) {
        self.state = LinkState::FullDuplexListening;
        self.servo.reset();
        self.query.reset();
        self.response.clear();
        self.cursor = 0;
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the response to a checksum-valid query.
fn answer<A: Acquisition>(
    query: &Query,
    sensors: &mut FilteredSensors<A>,
) -> Result<Response, FrameError> {
    let index = query.sensor_index().ok_or(FrameError::ReservedSensor)?;
    let type_code = sensors.sensor_type(index);
    if type_code == 0 {
        return Err(FrameError::NoSuchSensor);
    }

    match query.command().ok_or(FrameError::UnknownCommand)? {
        Command::Probe => Ok(ibus::probe_echo(query)),
        Command::Type => Ok(ibus::type_response(query.address(), type_code)),
        Command::Value => {
            let width = (type_code >> 8) as usize;
            if width != 2 && width != 4 {
                return Err(FrameError::UnsupportedWidth);
            }
            let value = sensors
                .sensor_value(index)
                .ok_or(FrameError::NoSuchSensor)?;
            ibus::value_response(query.address(), value, width)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorCalibration;
    use crate::drivers::ibus::{encode_query, encode_servo_frame};
    use crate::hal::mock::MockAdc;
    use crate::sensor::{SensorDescriptor, SensorKind, SensorRegistry};
    use crate::state::CHANNEL_COUNT;

    fn sensors() -> FilteredSensors<MockAdc> {
        let registry = SensorRegistry::new([
            SensorDescriptor::new(4, 0x0201, SensorKind::Temperature),
            SensorDescriptor::new(5, 0x0403, SensorKind::Raw),
            SensorDescriptor::new(6, 0x0302, SensorKind::Raw),
        ]);
        let mut adc = MockAdc::new();
        adc.set_reading(5, 3000);
        FilteredSensors::new(adc, registry, SensorCalibration::default())
    }

    fn feed<A: Acquisition>(
        link: &mut Link,
        sensors: &mut FilteredSensors<A>,
        bytes: &[u8],
    ) -> Received {
        let mut last = Received::Pending;
        for &b in bytes {
            last = link.on_byte_received(b, sensors);
        }
        last
    }

    fn drain(link: &mut Link) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(sent) = link.on_byte_sent() {
            match sent {
                Sent::More(b) => out.push(b),
                Sent::Last(b) => {
                    out.push(b);
                    break;
                }
            }
        }
        out
    }

    fn half_duplex() -> (Link, FilteredSensors<MockAdc>) {
        let mut link = Link::new();
        let mut s = sensors();
        let frame = encode_servo_frame(&[1500; CHANNEL_COUNT]);
        assert_eq!(feed(&mut link, &mut s, &frame), Received::ServoFrame);
        (link, s)
    }

    #[test]
    fn servo_frame_switches_to_half_duplex() {
        let (link, _) = half_duplex();
        assert_eq!(link.state(), LinkState::HalfDuplexListening);
        assert_eq!(link.channels(), &ChannelSet::centered());
    }

    #[test]
    fn full_cycle_returns_to_listening() {
        let (mut link, mut s) = half_duplex();
        assert_eq!(feed(&mut link, &mut s, &encode_query(0x91)), Received::Respond);
        assert_eq!(link.state(), LinkState::HalfDuplexTransmitting);

        // Bytes received while transmitting are ignored.
        assert_eq!(link.on_byte_received(0x04, &mut s), Received::Pending);

        let bytes = drain(&mut link);
        assert_eq!(bytes, ibus::type_response(0x91, 0x0201).as_slice());
        assert_eq!(link.state(), LinkState::HalfDuplexTrailing);
        assert_eq!(link.on_byte_sent(), None);

        assert!(link.on_transmit_complete());
        assert_eq!(link.state(), LinkState::HalfDuplexListening);
        assert!(!link.on_transmit_complete());
    }

    #[test]
    fn value_query_uses_declared_width() {
        let (mut link, mut s) = half_duplex();
        assert_eq!(feed(&mut link, &mut s, &encode_query(0xA2)), Received::Respond);
        let bytes = drain(&mut link);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..6], &[8, 0xA2, 0xB8, 0x0B, 0x00, 0x00]);
        assert_eq!(
            u16::from_le_bytes([bytes[6], bytes[7]]),
            ibus::checksum(&bytes[..6])
        );
    }

    #[test]
    fn unanswerable_queries_are_dropped() {
        let (mut link, mut s) = half_duplex();
        let cases = [
            (0x80, FrameError::ReservedSensor),
            (0x84, FrameError::NoSuchSensor),
            (0xB1, FrameError::UnknownCommand),
            (0xA3, FrameError::UnsupportedWidth),
        ];
        for (address, err) in cases {
            assert_eq!(
                feed(&mut link, &mut s, &encode_query(address)),
                Received::Dropped(err)
            );
            assert_eq!(link.state(), LinkState::HalfDuplexListening);
        }
        // Unsupported width never touches the ADC.
        assert_eq!(s.adc().conversions(), 0);
    }

    #[test]
    fn timeout_reverts_from_any_half_duplex_state() {
        let (mut link, mut s) = half_duplex();
        feed(&mut link, &mut s, &encode_query(0x81));
        link.on_byte_sent();
        assert_eq!(link.state(), LinkState::HalfDuplexTransmitting);

        link.on_timeout();
        assert_eq!(link.state(), LinkState::FullDuplexListening);
        assert_eq!(link.on_byte_sent(), None);
        assert!(link.response().is_empty());

        let frame = encode_servo_frame(&[1600; CHANNEL_COUNT]);
        assert_eq!(feed(&mut link, &mut s, &frame), Received::ServoFrame);
        assert_eq!(link.channels().get(0), 1600);
    }

    #[test]
    fn corrupted_frame_keeps_previous_channels() {
        let (mut link, mut s) = half_duplex();
        link.on_timeout();

        let mut frame = encode_servo_frame(&[1900; CHANNEL_COUNT]);
        frame[20] ^= 0x01;
        assert_eq!(
            feed(&mut link, &mut s, &frame),
            Received::Dropped(FrameError::BadChecksum)
        );
        assert_eq!(link.state(), LinkState::FullDuplexListening);
        assert_eq!(link.channels(), &ChannelSet::centered());
    }

    #[test]
    fn queries_ignored_in_full_duplex() {
        let mut link = Link::new();
        let mut s = sensors();
        assert_eq!(feed(&mut link, &mut s, &encode_query(0x81)), Received::Pending);
        assert_eq!(link.state(), LinkState::FullDuplexListening);
    }
}
