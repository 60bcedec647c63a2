//! Interrupt entry points. Each locks the shared controller for the length
//! of one event.

use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::pac;

use crate::CONTROLLER;

/// Turnaround timer preempts the link.
pub fn enable() {
    interrupt::TIM1_UP.set_priority(Priority::P1);
    interrupt::USART2.set_priority(Priority::P2);
    unsafe {
        interrupt::TIM1_UP.enable();
        interrupt::USART2.enable();
    }
}

#[interrupt]
fn USART2() {
    let usart = pac::USART2;
    let cr1 = usart.cr1().read();
    CONTROLLER.lock(|cell| {
        let mut slot = cell.borrow_mut();
        let Some(controller) = slot.as_mut() else {
            return;
        };
        if cr1.txeie() {
            controller.on_byte_sent();
        } else if cr1.tcie() {
            controller.on_transmit_complete();
        } else {
            // SR then DR clears RXNE and any overrun
            let _ = usart.sr().read();
            let byte = usart.dr().read().dr() as u8;
            controller.on_byte_received(byte);
        }
    });
}

#[interrupt]
fn TIM1_UP() {
    pac::TIM1.sr().modify(|w| w.set_uif(false));
    CONTROLLER.lock(|cell| {
        if let Some(controller) = cell.borrow_mut().as_mut() {
            controller.on_timeout();
        }
    });
}
