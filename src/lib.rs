#![cfg_attr(not(test), no_std)]

//! Servo/telemetry link and actuator mixing for an RC excavator.
//!
//! One serial wire carries iBUS servo frames from the receiver and, between
//! frames, sensor queries answered by this controller. Every valid servo frame
//! drives the pump, drive motors and valve servos through [`mixer::Mixer`].
//!
//! Everything here is hardware independent; the firmware binary provides the
//! [`hal`] implementations and routes interrupts into [`controller::Controller`].

#[macro_use]
mod log;

pub mod config;
pub mod controller;
pub mod drivers;
pub mod hal;
pub mod link;
pub mod mixer;
pub mod sensor;
pub mod state;

pub use controller::Controller;
