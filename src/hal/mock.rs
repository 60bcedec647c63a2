//! Mock peripherals for testing
//!
//! Each mock records what the core asked of it so tests can assert on the
//! exact register-level effect of an interrupt.

use heapless::Vec;

use super::{Acquisition, Actuators, DigitalOutput, PwmOutput, SerialLine, TurnaroundTimer};
use crate::state::LineMode;

/// Acquisition peripheral returning a fixed reading per channel.
#[derive(Debug, Default)]
pub struct MockAdc {
    readings: [u16; 16],
    conversions: u32,
    last_channel: Option<u8>,
}

impl MockAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(&mut self, channel: u8, raw: u16) {
        self.readings[channel as usize] = raw;
    }

    pub fn conversions(&self) -> u32 {
        self.conversions
    }

    pub fn last_channel(&self) -> Option<u8> {
        self.last_channel
    }
}

impl Acquisition for MockAdc {
    fn convert(&mut self, channel: u8) -> u16 {
        self.conversions += 1;
        self.last_channel = Some(channel);
        self.readings[channel as usize & 0x0f]
    }
}

/// PWM, digital outputs and watchdog.
#[derive(Debug, Default)]
pub struct MockActuators {
    duties: [u16; 7],
    outputs: [bool; 2],
    kicks: u32,
}

impl MockActuators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duty(&self, output: PwmOutput) -> u16 {
        self.duties[output.index()]
    }

    pub fn duties(&self) -> [u16; 7] {
        self.duties
    }

    pub fn output(&self, output: DigitalOutput) -> bool {
        self.outputs[output as usize]
    }

    pub fn watchdog_kicks(&self) -> u32 {
        self.kicks
    }
}

impl Actuators for MockActuators {
    fn set_duty(&mut self, output: PwmOutput, duty_us: u16) {
        self.duties[output.index()] = duty_us;
    }

    fn set_output(&mut self, output: DigitalOutput, active: bool) {
        self.outputs[output as usize] = active;
    }

    fn kick_watchdog(&mut self) {
        self.kicks += 1;
    }
}

/// Serial line that keeps every transmitted byte.
#[derive(Debug)]
pub struct MockLine {
    mode: LineMode,
    reconfigurations: u32,
    written: Vec<u8, 64>,
}

impl MockLine {
    pub fn new() -> Self {
        Self {
            mode: LineMode::FullDuplexReceive,
            reconfigurations: 0,
            written: Vec::new(),
        }
    }

    pub fn mode(&self) -> LineMode {
        self.mode
    }

    pub fn reconfigurations(&self) -> u32 {
        self.reconfigurations
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }
}

impl Default for MockLine {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLine for MockLine {
    fn configure(&mut self, mode: LineMode) {
        self.mode = mode;
        self.reconfigurations += 1;
    }

    fn write(&mut self, byte: u8) {
        let _ = self.written.push(byte);
    }
}

#[derive(Debug, Default)]
pub struct MockTimer {
    armed: u32,
}

impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times_armed(&self) -> u32 {
        self.armed
    }
}

impl TurnaroundTimer for MockTimer {
    fn arm(&mut self) {
        self.armed += 1;
    }
}
