#![no_std]
#![no_main]

mod board;
mod hw;
mod irq;

use core::cell::RefCell;
use embassy_executor::Spawner;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Flex, Level, Output, OutputType, Pin, Pull, Speed};
use embassy_stm32::time::hz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::timer::CountingMode;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use excavator_link::config::{MixerConfig, SensorCalibration, PWM_PERIOD_US};
use excavator_link::mixer::Mixer;
use excavator_link::sensor::{FilteredSensors, SensorRegistry};
use excavator_link::Controller;

use crate::board::Board;
use crate::hw::{AdcChannels, LinkUart, Outputs, Tim1Turnaround};

type FirmwareController = Controller<AdcChannels, Outputs, LinkUart, Tim1Turnaround>;

// ── Shared with the interrupt handlers ───────────────────────────────────────
pub static CONTROLLER: Mutex<CriticalSectionRawMutex, RefCell<Option<FirmwareController>>> =
    Mutex::new(RefCell::new(None));

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    // 1. Board init (72 MHz PLL)
    let board = Board::init();
    board.init_link();
    let p = board.p;

    // 2. Sensor inputs: PA4 = ADC ch4 (TMP36), PA5 = ADC ch5 (battery divider)
    let adc = Adc::new(p.ADC1, &mut Delay);
    let adc = AdcChannels::new(adc, [Flex::new(p.PA4.degrade()), Flex::new(p.PA5.degrade())]);

    // 3. Servo outputs @ 250 Hz
    //    TIM3: bucket PA6, boom PA7, stick PB0, pump PB1
    //    TIM2 (remapped): drive1 PA1, drive2 PB10, drive3 PB11
    let freq = hz(1_000_000 / PWM_PERIOD_US);
    let tim3 = SimplePwm::new(
        p.TIM3,
        Some(PwmPin::new_ch1(p.PA6, OutputType::PushPull)),
        Some(PwmPin::new_ch2(p.PA7, OutputType::PushPull)),
        Some(PwmPin::new_ch3(p.PB0, OutputType::PushPull)),
        Some(PwmPin::new_ch4(p.PB1, OutputType::PushPull)),
        freq,
        CountingMode::EdgeAlignedUp,
    );
    let tim2 = SimplePwm::new(
        p.TIM2,
        None,
        Some(PwmPin::new_ch2(p.PA1, OutputType::PushPull)),
        Some(PwmPin::new_ch3(p.PB10, OutputType::PushPull)),
        Some(PwmPin::new_ch4(p.PB11, OutputType::PushPull)),
        freq,
        CountingMode::EdgeAlignedUp,
    );

    // 4. Headlight PA0, pump LED PC13 (off = high)
    let headlight = Output::new(p.PA0.degrade(), Level::Low, Speed::Low);
    let pump_led = Output::new(p.PC13.degrade(), Level::High, Speed::Low);
    let outputs = Outputs::new(tim3, tim2, headlight, pump_led);

    // 5. Link RX pin pull-up; TX and the USART itself are set up by the board
    let mut _rx = Flex::new(p.PA3.degrade());
    _rx.set_as_input(Pull::Up);

    let controller = Controller::new(
        FilteredSensors::new(adc, SensorRegistry::default(), SensorCalibration::DEFAULT),
        Mixer::new(MixerConfig::DEFAULT),
        outputs,
        LinkUart::new(),
        Tim1Turnaround,
    );
    CONTROLLER.lock(|c| c.replace(Some(controller)));

    // 6. Everything else runs in interrupt context
    irq::enable();
    defmt::info!("link up");

    // Idle: diagnostics @ 5 Hz
    loop {
        Timer::after(Duration::from_millis(200)).await;
        let snapshot = CONTROLLER.lock(|c| c.borrow().as_ref().map(|c| c.snapshot()));
        if let Some(s) = snapshot {
            defmt::debug!("{}", s);
        }
    }
}
