//! Trait implementations over the STM32F103 peripherals.
//!
//! Setup goes through the embassy HAL where it has a driver; the hot paths
//! called from interrupt handlers poke registers through `pac`.

use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{AnyPin, Flex, Level, Output};
use embassy_stm32::pac;
use embassy_stm32::peripherals::{ADC1, TIM2, TIM3};
use embassy_stm32::timer::simple_pwm::SimplePwm;
use embassy_stm32::timer::{CaptureCompare16bitInstance, Channel};

use excavator_link::config::PWM_PERIOD_US;
use excavator_link::hal::{
    Acquisition, Actuators, DigitalOutput, PwmOutput, SerialLine, TurnaroundTimer,
};
use excavator_link::state::LineMode;

/// ADC1 in single-conversion mode, software triggered.
pub struct AdcChannels {
    _adc: Adc<'static, ADC1>,
    _pins: [Flex<'static, AnyPin>; 2],
}

impl AdcChannels {
    /// `adc` must be calibrated and powered; `pins` are put in analog mode.
    pub fn new(adc: Adc<'static, ADC1>, mut pins: [Flex<'static, AnyPin>; 2]) -> Self {
        for pin in pins.iter_mut() {
            pin.set_as_analog();
        }
        // Longest sample time on every channel
        pac::ADC1.smpr1().write_value(pac::adc::regs::Smpr1(0x00FF_FFFF));
        pac::ADC1.smpr2().write_value(pac::adc::regs::Smpr2(0x3FFF_FFFF));
        Self { _adc: adc, _pins: pins }
    }
}

impl Acquisition for AdcChannels {
    fn convert(&mut self, channel: u8) -> u16 {
        let adc = pac::ADC1;
        adc.sqr3().write(|w| w.set_sq(0, channel));
        // Setting ADON while already on starts a conversion
        adc.cr2().write(|w| w.set_adon(true));
        while !adc.sr().read().eoc() {}
        adc.dr().read().data()
    }
}

/// Valve and pump servos on TIM3, drives on TIM2, plus the two digital
/// outputs and the window watchdog.
pub struct Outputs {
    tim3: SimplePwm<'static, TIM3>,
    tim2: SimplePwm<'static, TIM2>,
    headlight: Output<'static, AnyPin>,
    pump_led: Output<'static, AnyPin>,
}

impl Outputs {
    pub fn new(
        mut tim3: SimplePwm<'static, TIM3>,
        mut tim2: SimplePwm<'static, TIM2>,
        headlight: Output<'static, AnyPin>,
        pump_led: Output<'static, AnyPin>,
    ) -> Self {
        for ch in [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4] {
            tim3.set_duty(ch, 0);
            tim3.enable(ch);
        }
        for ch in [Channel::Ch2, Channel::Ch3, Channel::Ch4] {
            tim2.set_duty(ch, 0);
            tim2.enable(ch);
        }
        Self {
            tim3,
            tim2,
            headlight,
            pump_led,
        }
    }
}

fn set_us<T: CaptureCompare16bitInstance>(pwm: &mut SimplePwm<'_, T>, ch: Channel, duty_us: u16) {
    let max = pwm.get_max_duty() as u32;
    let ticks = (duty_us as u32).min(PWM_PERIOD_US) * max / PWM_PERIOD_US;
    pwm.set_duty(ch, ticks as u16);
}

impl Actuators for Outputs {
    fn set_duty(&mut self, output: PwmOutput, duty_us: u16) {
        match output {
            PwmOutput::BucketValve => set_us(&mut self.tim3, Channel::Ch1, duty_us),
            PwmOutput::BoomValve => set_us(&mut self.tim3, Channel::Ch2, duty_us),
            PwmOutput::StickValve => set_us(&mut self.tim3, Channel::Ch3, duty_us),
            PwmOutput::Pump => set_us(&mut self.tim3, Channel::Ch4, duty_us),
            PwmOutput::Drive1 => set_us(&mut self.tim2, Channel::Ch2, duty_us),
            PwmOutput::Drive2 => set_us(&mut self.tim2, Channel::Ch3, duty_us),
            PwmOutput::Drive3 => set_us(&mut self.tim2, Channel::Ch4, duty_us),
        }
    }

    fn set_output(&mut self, output: DigitalOutput, active: bool) {
        match output {
            DigitalOutput::Headlight => self.headlight.set_level(Level::from(active)),
            // Blue pill LED, active low
            DigitalOutput::PumpIndicator => self.pump_led.set_level(Level::from(!active)),
        }
    }

    fn kick_watchdog(&mut self) {
        pac::WWDG.cr().write(|w| {
            w.set_t(excavator_link::config::WATCHDOG_RELOAD);
            w.set_wdga(true);
        });
    }
}

/// USART2 on PA2/PA3, switched between full and half duplex.
pub struct LinkUart {
    regs: pac::usart::Usart,
}

impl LinkUart {
    /// Register setup is done by [`crate::board::Board::init_link`].
    pub fn new() -> Self {
        Self { regs: pac::USART2 }
    }
}

impl SerialLine for LinkUart {
    fn configure(&mut self, mode: LineMode) {
        let r = self.regs;
        match mode {
            LineMode::FullDuplexReceive => {
                r.cr3().write(|w| w.set_hdsel(false));
                r.cr1().write(|w| {
                    w.set_ue(true);
                    w.set_re(true);
                    w.set_rxneie(true);
                });
            }
            LineMode::HalfDuplexReceive => {
                r.cr3().write(|w| w.set_hdsel(true));
                r.cr1().write(|w| {
                    w.set_ue(true);
                    w.set_re(true);
                    w.set_rxneie(true);
                });
            }
            // TE going 0 -> 1 queues the idle frame
            LineMode::HalfDuplexTransmit => r.cr1().write(|w| {
                w.set_ue(true);
                w.set_te(true);
                w.set_txeie(true);
            }),
            LineMode::HalfDuplexDrain => r.cr1().write(|w| {
                w.set_ue(true);
                w.set_te(true);
                w.set_tcie(true);
            }),
        }
    }

    fn write(&mut self, byte: u8) {
        // SR read followed by DR write clears TC
        let _ = self.regs.sr().read();
        self.regs.dr().write(|w| w.set_dr(byte as u16));
    }
}

/// TIM1 one-shot at 1 MHz, update interrupt enabled by the board setup.
pub struct Tim1Turnaround;

impl TurnaroundTimer for Tim1Turnaround {
    fn arm(&mut self) {
        let tim = pac::TIM1;
        tim.cnt().write(|w| w.set_cnt(0));
        tim.cr1().write(|w| {
            w.set_opm(true);
            w.set_cen(true);
        });
    }
}
