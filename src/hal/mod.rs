//! Peripheral traits the link, sensor and mixer logic are generic over.
//!
//! The firmware implements these on top of the STM32 registers; tests use
//! [`mock`].

use crate::state::LineMode;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// PWM compare outputs, all on a 1 µs timebase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmOutput {
    BucketValve,
    BoomValve,
    StickValve,
    Pump,
    Drive1,
    Drive2,
    Drive3,
}

impl PwmOutput {
    pub const ALL: [PwmOutput; 7] = [
        PwmOutput::BucketValve,
        PwmOutput::BoomValve,
        PwmOutput::StickValve,
        PwmOutput::Pump,
        PwmOutput::Drive1,
        PwmOutput::Drive2,
        PwmOutput::Drive3,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DigitalOutput {
    Headlight,
    /// Lit while the pump is running.
    PumpIndicator,
}

/// Analog acquisition peripheral.
pub trait Acquisition {
    /// Select `channel`, start a conversion and block until it completes.
    fn convert(&mut self, channel: u8) -> u16;
}

/// Actuator outputs driven once per mix cycle.
pub trait Actuators {
    fn set_duty(&mut self, output: PwmOutput, duty_us: u16);
    fn set_output(&mut self, output: DigitalOutput, active: bool);
    fn kick_watchdog(&mut self);
}

/// The shared serial wire.
pub trait SerialLine {
    /// Reconfigure direction and interrupt source. Entering
    /// [`LineMode::HalfDuplexTransmit`] from a receive mode emits an idle
    /// frame that marks the turnaround for the remote end.
    fn configure(&mut self, mode: LineMode);
    fn write(&mut self, byte: u8);
}

/// One-shot timer that reverts the line to full duplex.
pub trait TurnaroundTimer {
    /// (Re)start the countdown from zero.
    fn arm(&mut self);
}
