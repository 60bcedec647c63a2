//! Compile-time configuration: trims, actuator shaping, calibration and
//! link timing.

use crate::sensor::{SensorDescriptor, SensorKind};

/* --------------------------- RC timebase -------------------------- */
/// Stick/servo neutral in microseconds.
pub const NEUTRAL: i32 = 1500;
/// 3-position switch: below this is position 0.
pub const SWITCH_LOW: i32 = 1450;
/// 3-position switch: above this is position 2.
pub const SWITCH_HIGH: i32 = 1550;

/* --------------------------- Valve sticks -------------------------- */
pub const BUCKET_TRIM: i32 = -50;
pub const BOOM_TRIM: i32 = 50;
pub const STICK_TRIM: i32 = -80;

pub const VALVE_MIN: i32 = 220; // Still closed
pub const VALVE_MAX: i32 = 280; // Fully open
pub const VALVE_MUL: i32 = 100; // Input multiplier (%)

/* --------------------------- Pump & drives -------------------------- */
pub const PUMP_MIN: i32 = 60; // Minimum duty
pub const PUMP_MAX: i32 = 340; // Maximum duty
pub const PUMP_LIM: i32 = 20; // Acceleration limit

pub const DRIVE_MIN: i32 = 50; // Minimum duty
pub const DRIVE_MAX: i32 = 500; // Maximum duty
pub const DRIVE_LIM: i32 = 10; // Acceleration limit

/* --------------------------- Sensor calibration -------------------------- */
pub const VOLT1: i32 = 3381; // mV
pub const VOLT2: i32 = 3719; // xx.xxV = VOLT1*(R1+R2)/R2

/// Onboard sensors, addressed on the wire as index + 1.
pub const SENSORS: [SensorDescriptor; 3] = [
    SensorDescriptor::new(4, 0x0201, SensorKind::Temperature),
    SensorDescriptor::new(5, 0x0203, SensorKind::Voltage),
    SensorDescriptor::ABSENT,
];

/* --------------------------- Link & timers -------------------------- */
pub const LINK_BAUDRATE: u32 = 115_200;
/// Half-duplex window after each servo frame before reverting to full duplex.
pub const TURNAROUND_US: u32 = 3_600;
/// PWM period on the 1 µs timebase (250 Hz).
pub const PWM_PERIOD_US: u32 = 4_000;
/// WWDG counter reload; timeout 4096*8*64/PCLK1 ≈ 58 ms.
pub const WATCHDOG_RELOAD: u8 = 0x7f;

/// Actuator shaping used by [`crate::mixer::Mixer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixerConfig {
    pub trims: [i32; 3],
    pub valve_min: i32,
    pub valve_max: i32,
    pub valve_mul: i32,
    pub pump_min: i32,
    pub pump_max: i32,
    pub pump_lim: i32,
    pub drive_min: i32,
    pub drive_max: i32,
    pub drive_lim: i32,
}

impl MixerConfig {
    pub const DEFAULT: Self = Self {
        trims: [BUCKET_TRIM, BOOM_TRIM, STICK_TRIM],
        valve_min: VALVE_MIN,
        valve_max: VALVE_MAX,
        valve_mul: VALVE_MUL,
        pump_min: PUMP_MIN,
        pump_max: PUMP_MAX,
        pump_lim: PUMP_LIM,
        drive_min: DRIVE_MIN,
        drive_max: DRIVE_MAX,
        drive_lim: DRIVE_LIM,
    };
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Linear ADC-to-engineering conversion constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorCalibration {
    /// ADC reference in mV.
    pub vref_mv: i32,
    /// Divider-scaled reference in 10 mV units.
    pub divider_ref: i32,
}

impl SensorCalibration {
    pub const DEFAULT: Self = Self {
        vref_mv: VOLT1,
        divider_ref: VOLT2,
    };
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}
