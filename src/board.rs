use embassy_stm32::pac;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;

use excavator_link::config::{LINK_BAUDRATE, TURNAROUND_US, WATCHDOG_RELOAD};

/// APB1 clock feeding USART2 and the WWDG.
pub const APB1_HZ: u32 = 36_000_000;
/// Timer clock on APB2 (TIM1).
pub const TIM1_HZ: u32 = 72_000_000;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(TimeHertz(8_000_000)); // Quartz 8MHz
        config.rcc.sys_ck = Some(TimeHertz(72_000_000));
        config.rcc.pclk1 = Some(TimeHertz(APB1_HZ));
        config.rcc.pclk2 = Some(TimeHertz(TIM1_HZ));
        config.rcc.adcclk = Some(TimeHertz(12_000_000));

        let p = embassy_stm32::init(config);

        Self { p }
    }

    /// Register-level setup for the peripherals the interrupt handlers drive
    /// directly: USART2 (shared wire), TIM1 (turnaround one-shot) and WWDG.
    pub fn init_link(&self) {
        pac::RCC.apb1enr().modify(|w| {
            w.set_usart2en(true);
            w.set_wwdgen(true);
        });
        pac::RCC.apb2enr().modify(|w| {
            w.set_afioen(true);
            w.set_tim1en(true);
        });

        // TIM2 partial remap 2: CH3/CH4 on PB10/PB11, freeing PA2/PA3 for USART2
        pac::AFIO.mapr().modify(|w| w.set_tim2_remap(0b10));

        // PA2 = USART2_TX, alternate push-pull
        pac::GPIOA.cr(0).modify(|w| {
            w.set_mode(2, pac::gpio::vals::Mode::OUTPUT2MHZ);
            w.set_cnf_out(2, pac::gpio::vals::CnfOut::ALTPUSHPULL);
        });

        let usart = pac::USART2;
        usart.brr().write_value(pac::usart::regs::Brr(APB1_HZ / LINK_BAUDRATE));
        usart.cr3().write(|w| w.set_hdsel(false));
        usart.cr1().write(|w| {
            w.set_ue(true);
            w.set_re(true);
            w.set_rxneie(true);
        });

        let tim = pac::TIM1;
        tim.psc().write_value((TIM1_HZ / 1_000_000 - 1) as u16); // 1MHz
        tim.arr().write(|w| w.set_arr((TURNAROUND_US - 1) as u16));
        tim.egr().write(|w| w.set_ug(true));
        tim.sr().write(|w| w.set_uif(false));
        tim.dier().write(|w| w.set_uie(true));

        // Window open over the full count; started by the first kick.
        // Timeout 4096*8*64/PCLK1 ≈ 58ms
        pac::WWDG.cfr().write(|w| {
            w.set_w(WATCHDOG_RELOAD);
            w.set_wdgtb(pac::wwdg::vals::Wdgtb::DIV8);
        });
    }
}
