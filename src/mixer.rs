//! Channel-to-actuator mixing.
//!
//! Channel map:
//! - 0..=2: bucket, boom and stick valves (each may be borrowed as a drive input)
//! - 3..=5: plain drive inputs
//! - 6: light switch
//! - 7: drive mode switch
//!
//! Outputs are duties on the RC timebase (1500 µs neutral): three valve
//! servos, the hydraulic pump and three drive motors.

use crate::config::{MixerConfig, NEUTRAL, PWM_PERIOD_US, SWITCH_HIGH, SWITCH_LOW};
use crate::hal::{Actuators, DigitalOutput, PwmOutput};
use crate::state::{ChannelSet, MixerSnapshot};

const CH_BUCKET: usize = 0;
const CH_BOOM: usize = 1;
const CH_STICK: usize = 2;
const CH_DRIVE: [usize; 3] = [3, 4, 5];
const CH_LIGHT: usize = 6;
const CH_MODE: usize = 7;

/// Ramp reference points either side of the drive deadband.
const RAMP_FLOOR: i32 = SWITCH_LOW;
const RAMP_CEIL: i32 = SWITCH_HIGH;

/// Which sticks feed the pump and which feed the drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveMode {
    /// All three valve sticks feed the pump; drives follow channels 3..=5.
    Independent,
    /// Boom feeds the pump; bucket drives motor 1; stick and channel 3
    /// steer motors 2/3 differentially.
    StickSteer,
    /// Stick feeds the pump; channel 3 drives motor 1; boom and bucket steer
    /// motors 2/3 differentially.
    BoomSteer,
}

impl DriveMode {
    pub fn from_switch(position: u8) -> Self {
        match position {
            0 => Self::Independent,
            1 => Self::StickSteer,
            _ => Self::BoomSteer,
        }
    }

    fn position(self) -> u8 {
        self as u8
    }
}

/// 3-position switch with a band around neutral.
pub fn switch_position(t: i32) -> u8 {
    if t < SWITCH_LOW {
        return 0;
    }
    if t > SWITCH_HIGH {
        return 2;
    }
    1
}

/// Decoded valve stick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValveInput {
    /// Pump demand (valve role) or signed centred stick (drive role).
    pub value: i32,
    /// Duty for the stick's valve servo.
    pub servo: i32,
}

/// Decode a valve stick.
///
/// In valve role the servo follows the stick plus trim, and the pump demand
/// is the stick deflection shaped in two slopes: zero up to `valve_min`, a
/// half-rate ramp up to `valve_max`, then full rate referenced to the
/// midpoint of the two. In drive role the servo parks at neutral plus trim
/// and the raw centred stick is returned.
pub fn valve_input(t: i32, trim: i32, drive_role: bool, cfg: &MixerConfig) -> ValveInput {
    if drive_role {
        return ValveInput {
            value: t - NEUTRAL,
            servo: NEUTRAL + trim,
        };
    }

    let servo = t + trim;
    let d = (t - NEUTRAL).abs();
    let value = if d < cfg.valve_min {
        0
    } else if d < cfg.valve_max {
        cfg.valve_mul * (d - cfg.valve_min) / 200
    } else {
        cfg.valve_mul * (d - (cfg.valve_min + cfg.valve_max) / 2) / 100
    };
    ValveInput { value, servo }
}

pub fn drive_input(t: i32) -> i32 {
    t - NEUTRAL
}

/// Pump duty and whether the pump is running. Any demand adds the minimum
/// kick duty so the pump starts reliably.
pub fn pump_output(t: i32, cfg: &MixerConfig) -> (i32, bool) {
    if t == 0 {
        return (NEUTRAL, false);
    }
    let t = t + cfg.pump_min;
    if t > cfg.pump_max {
        return (NEUTRAL + cfg.pump_max, true);
    }
    (NEUTRAL + t, true)
}

/// Drive duty with deadband and symmetric clamp.
pub fn drive_output(t: i32, cfg: &MixerConfig) -> i32 {
    if t > -cfg.drive_min && t < cfg.drive_min {
        return NEUTRAL;
    }
    (NEUTRAL + t).clamp(NEUTRAL - cfg.drive_max, NEUTRAL + cfg.drive_max)
}

/// Limit how fast `target` may move away from neutral relative to `prev`.
///
/// Moves towards neutral are taken immediately. Moving out of neutral jumps
/// straight past the deadband edge (`RAMP_FLOOR`/`RAMP_CEIL`) and then
/// advances `step` per call. A zero `prev` (never commanded) or zero `step`
/// passes the target through.
pub fn ramp(target: i32, prev: i32, step: i32) -> i32 {
    if prev == 0 || step == 0 {
        return target;
    }
    if target < NEUTRAL {
        let limit = (prev - step).min(RAMP_FLOOR);
        if target < limit {
            return limit;
        }
    } else {
        let limit = (prev + step).max(RAMP_CEIL);
        if target > limit {
            return limit;
        }
    }
    target
}

/// Mixer state: last commanded duties and cached switch decodes.
pub struct Mixer {
    cfg: MixerConfig,
    duties: [i32; 7],
    pump_active: bool,
    light: u8,
    mode: DriveMode,
    inputs: [i32; 6],
    cycles: u32,
}

impl Mixer {
    pub const fn new(cfg: MixerConfig) -> Self {
        Self {
            cfg,
            duties: [0; 7],
            pump_active: false,
            light: 0,
            mode: DriveMode::Independent,
            inputs: [0; 6],
            cycles: 0,
        }
    }

    /// Run one mix cycle and write every output. Called once per valid
    /// servo frame; ends by kicking the watchdog.
    pub fn update<O: Actuators>(&mut self, ch: &ChannelSet, out: &mut O) {
        let cfg = self.cfg;
        self.light = switch_position(ch.get(CH_LIGHT));
        let mode_switch = switch_position(ch.get(CH_MODE));
        self.mode = DriveMode::from_switch(mode_switch);

        // All three valves pass through trims in every mode.
        let bucket = valve_input(ch.get(CH_BUCKET), cfg.trims[0], mode_switch != 0, &cfg);
        let boom = valve_input(ch.get(CH_BOOM), cfg.trims[1], mode_switch == 2, &cfg);
        let stick = valve_input(ch.get(CH_STICK), cfg.trims[2], mode_switch == 1, &cfg);
        let drive = CH_DRIVE.map(|i| drive_input(ch.get(i)));

        let (i1, i2, i3) = (bucket.value, boom.value, stick.value);
        let (pump, d1, d2, d3) = match self.mode {
            DriveMode::Independent => (i1 + i2 + i3, drive[0], drive[1], drive[2]),
            DriveMode::StickSteer => (i2, i1, i3 + drive[0], i3 - drive[0]),
            DriveMode::BoomSteer => (i3, drive[0], i2 + i1, i2 - i1),
        };

        let (pump_duty, pump_active) = pump_output(pump, &cfg);
        self.pump_active = pump_active;

        let targets = [
            bucket.servo,
            boom.servo,
            stick.servo,
            ramp(pump_duty, self.duties[3], cfg.pump_lim),
            ramp(drive_output(d1, &cfg), self.duties[4], cfg.drive_lim),
            ramp(drive_output(d2, &cfg), self.duties[5], cfg.drive_lim),
            ramp(drive_output(d3, &cfg), self.duties[6], cfg.drive_lim),
        ];
        self.duties = targets;
        self.inputs = [i1, i2, i3, drive[0], drive[1], drive[2]];

        for output in PwmOutput::ALL {
            out.set_duty(output, to_compare(self.duties[output.index()]));
        }
        out.set_output(DigitalOutput::Headlight, self.light != 0);
        out.set_output(DigitalOutput::PumpIndicator, self.pump_active);
        out.kick_watchdog();

        self.cycles = self.cycles.wrapping_add(1);
        log_trace!("mix mode={:?} pump={}", self.mode, self.duties[3]);
    }

    pub fn duty(&self, output: PwmOutput) -> i32 {
        self.duties[output.index()]
    }

    pub fn pump_active(&self) -> bool {
        self.pump_active
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.mode
    }

    pub fn snapshot(&self) -> MixerSnapshot {
        MixerSnapshot {
            duties: self.duties.map(to_compare),
            inputs: self.inputs,
            light_switch: self.light,
            drive_mode: self.mode.position(),
            cycles: self.cycles,
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(MixerConfig::DEFAULT)
    }
}

fn to_compare(duty: i32) -> u16 {
    duty.clamp(0, PWM_PERIOD_US as i32) as u16
}
