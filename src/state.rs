/// Shared value types passed between the link, the mixer and the firmware.
///
/// All types are `Copy` so the firmware can take cheap snapshots out of the
/// interrupt-owned controller.

// ── Channel values ────────────────────────────────────────────────────────────

pub const CHANNEL_COUNT: usize = 14;

/// Latest validated servo frame, ~1000..2000 µs per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSet {
    pub channels: [i32; CHANNEL_COUNT],
}

impl ChannelSet {
    pub const fn centered() -> Self {
        Self {
            channels: [crate::config::NEUTRAL; CHANNEL_COUNT],
        }
    }

    pub fn get(&self, index: usize) -> i32 {
        self.channels[index]
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self {
            channels: [0; CHANNEL_COUNT],
        }
    }
}

// ── Wire direction ────────────────────────────────────────────────────────────

/// Hardware configuration of the shared serial line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineMode {
    /// RX pin only, receive interrupt enabled. Waiting for servo frames.
    FullDuplexReceive,
    /// Single-wire, receive interrupt enabled. Waiting for sensor queries.
    HalfDuplexReceive,
    /// Single-wire, transmitter on with transmit-empty interrupt.
    HalfDuplexTransmit,
    /// Single-wire, transmitter on with transmit-complete interrupt.
    HalfDuplexDrain,
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// One mix cycle's outputs and decoded inputs, for the periodic debug log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixerSnapshot {
    /// Duty per PWM output in [`crate::hal::PwmOutput`] order.
    pub duties: [u16; 7],
    /// Decoded valve (3) and drive (3) inputs.
    pub inputs: [i32; 6],
    /// Light switch position.
    pub light_switch: u8,
    /// Drive mode switch position.
    pub drive_mode: u8,
    pub cycles: u32,
}
