//! Onboard telemetry sensors: descriptor table, acquisition and smoothing.

use crate::config::{SensorCalibration, SENSORS};
use crate::drivers::filter::EmaFilter;
use crate::hal::Acquisition;

pub const SENSOR_SLOTS: usize = 3;

/// Which calibration formula applies to a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorKind {
    /// TMP36 on an ADC channel.
    Temperature,
    /// Battery voltage through a resistor divider.
    Voltage,
    /// Raw filtered ADC counts.
    Raw,
}

/// One slot of the sensor table.
///
/// `type_code` low byte is the iBUS sensor type, high byte the payload width
/// in bytes. A zero ADC channel marks the slot as not installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorDescriptor {
    pub channel: u8,
    pub type_code: u16,
    pub kind: SensorKind,
}

impl SensorDescriptor {
    pub const ABSENT: Self = Self {
        channel: 0,
        type_code: 0,
        kind: SensorKind::Raw,
    };

    pub const fn new(channel: u8, type_code: u16, kind: SensorKind) -> Self {
        Self {
            channel,
            type_code,
            kind,
        }
    }

    pub const fn is_installed(&self) -> bool {
        self.channel != 0
    }

    /// Declared payload width in bytes.
    pub const fn width(&self) -> usize {
        (self.type_code >> 8) as usize
    }
}

/// Immutable sensor table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorRegistry {
    slots: [SensorDescriptor; SENSOR_SLOTS],
}

impl SensorRegistry {
    pub const fn new(slots: [SensorDescriptor; SENSOR_SLOTS]) -> Self {
        Self { slots }
    }

    pub fn get(&self, index: usize) -> Option<&SensorDescriptor> {
        self.slots.get(index)
    }

    /// Declared type code, 0 for out-of-range or empty slots.
    pub fn sensor_type(&self, index: usize) -> u16 {
        self.get(index).map_or(0, |d| d.type_code)
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new(SENSORS)
    }
}

/// Map a filtered ADC reading to the value reported on the wire.
pub fn to_engineering(kind: SensorKind, raw: i32, cal: &SensorCalibration) -> i32 {
    match kind {
        // 10 mV/°C with 500 mV offset; iBUS wants (°C + 40) * 10
        SensorKind::Temperature => ((raw * cal.vref_mv) >> 12) - 100,
        SensorKind::Voltage => (raw * cal.divider_ref) >> 12,
        SensorKind::Raw => raw,
    }
}

/// Sensor table plus per-slot smoothing state over an acquisition peripheral.
pub struct FilteredSensors<A> {
    adc: A,
    registry: SensorRegistry,
    calibration: SensorCalibration,
    filters: [EmaFilter; SENSOR_SLOTS],
}

impl<A: Acquisition> FilteredSensors<A> {
    pub fn new(adc: A, registry: SensorRegistry, calibration: SensorCalibration) -> Self {
        Self {
            adc,
            registry,
            calibration,
            filters: [EmaFilter::new(), EmaFilter::new(), EmaFilter::new()],
        }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn sensor_type(&self, index: usize) -> u16 {
        self.registry.sensor_type(index)
    }

    /// Acquire, filter and convert one reading.
    ///
    /// Blocks until the conversion completes. Returns `None` without touching
    /// the peripheral for absent sensors.
    pub fn sensor_value(&mut self, index: usize) -> Option<i32> {
        let desc = *self.registry.get(index)?;
        if !desc.is_installed() {
            return None;
        }
        let raw = self.adc.convert(desc.channel);
        let smoothed = self.filters[index].filter(raw);
        Some(to_engineering(desc.kind, smoothed, &self.calibration))
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}
