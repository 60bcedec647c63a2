//! Interrupt-level composition of link, sensors and mixer.
//!
//! Each `on_*` method is the body of one interrupt source and runs to
//! completion. The firmware keeps the controller behind a critical-section
//! mutex so no two of them ever interleave.

use crate::hal::{Acquisition, Actuators, SerialLine, TurnaroundTimer};
use crate::link::{Link, LinkState, Received, Sent};
use crate::mixer::Mixer;
use crate::sensor::FilteredSensors;
use crate::state::{LineMode, MixerSnapshot};

pub struct Controller<A, O, L, T> {
    link: Link,
    sensors: FilteredSensors<A>,
    mixer: Mixer,
    actuators: O,
    line: L,
    timer: T,
}

impl<A, O, L, T> Controller<A, O, L, T>
where
    A: Acquisition,
    O: Actuators,
    L: SerialLine,
    T: TurnaroundTimer,
{
    pub fn new(sensors: FilteredSensors<A>, mixer: Mixer, actuators: O, mut line: L, timer: T) -> Self {
        line.configure(LineMode::FullDuplexReceive);
        Self {
            link: Link::new(),
            sensors,
            mixer,
            actuators,
            line,
            timer,
        }
    }

    /// Receive-not-empty.
    pub fn on_byte_received(&mut self, byte: u8) {
        match self.link.on_byte_received(byte, &mut self.sensors) {
            Received::Pending => {}
            Received::ServoFrame => {
                self.mixer.update(self.link.channels(), &mut self.actuators);
                self.timer.arm();
                self.line.configure(LineMode::HalfDuplexReceive);
            }
            Received::Respond => {
                log_trace!("respond {} bytes", self.link.response().len());
                self.line.configure(LineMode::HalfDuplexTransmit);
            }
            Received::Dropped(reason) => {
                log_trace!("frame dropped: {:?}", reason);
            }
        }
    }

    /// Transmit-empty.
    pub fn on_byte_sent(&mut self) {
        match self.link.on_byte_sent() {
            Some(Sent::More(byte)) => self.line.write(byte),
            Some(Sent::Last(byte)) => {
                self.line.write(byte);
                self.line.configure(LineMode::HalfDuplexDrain);
            }
            None => {
                log_warn!("transmit interrupt in {:?}", self.link.state());
                self.line.configure(line_mode(self.link.state()));
            }
        }
    }

    /// Transmit-complete.
    pub fn on_transmit_complete(&mut self) {
        if self.link.on_transmit_complete() {
            self.line.configure(LineMode::HalfDuplexReceive);
        }
    }

    /// Turnaround timer expiry.
    pub fn on_timeout(&mut self) {
        if self.link.state() != LinkState::HalfDuplexListening {
            log_debug!("turnaround while {:?}", self.link.state());
        }
        self.link.on_timeout();
        self.line.configure(LineMode::FullDuplexReceive);
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn snapshot(&self) -> MixerSnapshot {
        self.mixer.snapshot()
    }

    pub fn sensors_mut(&mut self) -> &mut FilteredSensors<A> {
        &mut self.sensors
    }

    pub fn actuators(&self) -> &O {
        &self.actuators
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

/// Line configuration that belongs to a link state.
fn line_mode(state: LinkState) -> LineMode {
    match state {
        LinkState::FullDuplexListening => LineMode::FullDuplexReceive,
        LinkState::HalfDuplexListening => LineMode::HalfDuplexReceive,
        LinkState::HalfDuplexTransmitting => LineMode::HalfDuplexTransmit,
        LinkState::HalfDuplexTrailing => LineMode::HalfDuplexDrain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorCalibration;
    use crate::drivers::ibus::{self, encode_query, encode_servo_frame};
    use crate::hal::mock::{MockActuators, MockAdc, MockLine, MockTimer};
    use crate::hal::PwmOutput;
    use crate::sensor::{SensorDescriptor, SensorKind, SensorRegistry};
    use crate::state::{ChannelSet, CHANNEL_COUNT};

    type TestController = Controller<MockAdc, MockActuators, MockLine, MockTimer>;

    fn controller(registry: SensorRegistry) -> TestController {
        Controller::new(
            FilteredSensors::new(MockAdc::new(), registry, SensorCalibration::default()),
            Mixer::default(),
            MockActuators::new(),
            MockLine::new(),
            MockTimer::new(),
        )
    }

    fn receive(c: &mut TestController, bytes: &[u8]) {
        for &b in bytes {
            c.on_byte_received(b);
        }
    }

    /// Service transmit interrupts until the line leaves transmit mode.
    fn transmit(c: &mut TestController) -> Vec<u8> {
        c.line_mut().clear_written();
        while c.line().mode() == LineMode::HalfDuplexTransmit {
            c.on_byte_sent();
        }
        assert_eq!(c.line().mode(), LineMode::HalfDuplexDrain);
        c.on_transmit_complete();
        c.line().written().to_vec()
    }

    fn neutral_frame() -> [u8; ibus::SERVO_FRAME_LEN] {
        encode_servo_frame(&[1500; CHANNEL_COUNT])
    }

    #[test]
    fn spurious_transmit_interrupt_is_masked() {
        let mut c = controller(SensorRegistry::default());
        receive(&mut c, &neutral_frame());
        c.on_byte_sent();
        assert!(c.line().written().is_empty());
        assert_eq!(c.line().mode(), LineMode::HalfDuplexReceive);
    }

    #[test]
    fn neutral_frame_mixes_once_and_turns_around() {
        let mut c = controller(SensorRegistry::default());
        assert_eq!(c.line().mode(), LineMode::FullDuplexReceive);

        receive(&mut c, &neutral_frame());

        assert_eq!(c.actuators().watchdog_kicks(), 1);
        assert_eq!(c.timer().times_armed(), 1);
        assert_eq!(c.line().mode(), LineMode::HalfDuplexReceive);
        for output in [
            PwmOutput::Pump,
            PwmOutput::Drive1,
            PwmOutput::Drive2,
            PwmOutput::Drive3,
        ] {
            assert_eq!(c.actuators().duty(output), 1500);
        }
    }

    #[test]
    fn probe_is_echoed() {
        let mut c = controller(SensorRegistry::default());
        receive(&mut c, &neutral_frame());

        let query = encode_query(0x81);
        receive(&mut c, &query);
        assert_eq!(c.line().mode(), LineMode::HalfDuplexTransmit);
        assert_eq!(transmit(&mut c), query.to_vec());
        assert_eq!(c.line().mode(), LineMode::HalfDuplexReceive);
        assert_eq!(c.link().state(), LinkState::HalfDuplexListening);
    }

    #[test]
    fn type_query_reports_configured_code() {
        let mut c = controller(SensorRegistry::default());
        receive(&mut c, &neutral_frame());

        receive(&mut c, &encode_query(0x92));
        let bytes = transmit(&mut c);
        assert_eq!(bytes.len(), 6);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 0x0203);
    }

    #[test]
    fn four_byte_value_response() {
        let registry = SensorRegistry::new([
            SensorDescriptor::new(4, 0x0201, SensorKind::Temperature),
            SensorDescriptor::new(7, 0x0441, SensorKind::Raw),
            SensorDescriptor::ABSENT,
        ]);
        let mut c = controller(registry);
        c.sensors_mut().adc_mut().set_reading(7, 0x0ABC);
        receive(&mut c, &neutral_frame());

        receive(&mut c, &encode_query(0xA2));
        let bytes = transmit(&mut c);
        let sum = ibus::checksum(&[8, 0xA2, 0xBC, 0x0A, 0x00, 0x00]).to_le_bytes();
        assert_eq!(bytes, vec![8, 0xA2, 0xBC, 0x0A, 0x00, 0x00, sum[0], sum[1]]);
    }

    #[test]
    fn two_byte_value_response() {
        let mut c = controller(SensorRegistry::default());
        c.sensors_mut().adc_mut().set_reading(5, 2048);
        receive(&mut c, &neutral_frame());

        receive(&mut c, &encode_query(0xA2));
        let bytes = transmit(&mut c);
        assert_eq!(bytes.len(), 6);
        // (2048 * 3719) >> 12
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 1859);
    }

    #[test]
    fn absent_sensor_gets_no_response() {
        let mut c = controller(SensorRegistry::default());
        receive(&mut c, &neutral_frame());
        let before = c.line().reconfigurations();

        for address in [0xA3, 0x93, 0x83, 0xA4] {
            receive(&mut c, &encode_query(address));
        }
        assert_eq!(c.line().reconfigurations(), before);
        assert!(c.line().written().is_empty());
        assert_eq!(c.link().state(), LinkState::HalfDuplexListening);
    }

    #[test]
    fn corrupted_frame_changes_nothing() {
        let mut c = controller(SensorRegistry::default());
        let mut channels = [1500u16; CHANNEL_COUNT];
        channels[3] = 1800;
        channels[7] = 1000;
        receive(&mut c, &encode_servo_frame(&channels));
        c.on_timeout();

        let duties = c.actuators().duties();
        let kicks = c.actuators().watchdog_kicks();
        let published = *c.link().channels();

        let mut bad = encode_servo_frame(&[1900; CHANNEL_COUNT]);
        bad[ibus::SERVO_FRAME_LEN - 2] ^= 0xFF;
        receive(&mut c, &bad);

        assert_eq!(c.actuators().duties(), duties);
        assert_eq!(c.actuators().watchdog_kicks(), kicks);
        assert_eq!(*c.link().channels(), published);
        assert_eq!(c.timer().times_armed(), 1);
        assert_eq!(c.line().mode(), LineMode::FullDuplexReceive);
    }

    #[test]
    fn timeout_mid_response_restores_full_duplex() {
        let mut c = controller(SensorRegistry::default());
        receive(&mut c, &neutral_frame());
        receive(&mut c, &encode_query(0x91));
        c.on_byte_sent();

        c.on_timeout();
        assert_eq!(c.line().mode(), LineMode::FullDuplexReceive);
        assert_eq!(c.link().state(), LinkState::FullDuplexListening);

        let mut channels = [1500u16; CHANNEL_COUNT];
        channels[0] = 1700;
        receive(&mut c, &encode_servo_frame(&channels));
        assert_eq!(c.timer().times_armed(), 2);
        assert_eq!(c.link().channels().get(0), 1700);
        assert_ne!(*c.link().channels(), ChannelSet::centered());
    }

    #[test]
    fn drives_ramp_across_frames() {
        let mut c = controller(SensorRegistry::default());
        let mut channels = [1500u16; CHANNEL_COUNT];
        channels[7] = 1000;
        receive(&mut c, &encode_servo_frame(&channels));

        channels[3] = 1800;
        let mut last = 1500;
        for _ in 0..5 {
            c.on_timeout();
            receive(&mut c, &encode_servo_frame(&channels));
            let duty = c.actuators().duty(PwmOutput::Drive1);
            assert!(duty > last && duty <= 1800);
            last = duty;
        }
        assert_eq!(last, 1590);
        assert_eq!(c.snapshot().cycles, 6);
    }
}
