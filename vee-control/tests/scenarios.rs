// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios driven through real MMIO register writes, not the
//! leaf components' own unit-level APIs: a guest only ever sees GPIO and
//! SPI registers, so these tests only ever touch `VeeMachine::gpio()` and
//! `VeeMachine::spi()`.

use std::rc::Rc;

use vee_control::VeeMachine;
use vee_gpio::GpioReg;
use vee_spi::SpiReg;
use vee_ssd1306::{DISPLAY_HEIGHT, DISPLAY_WIDTH, ON_COLOR, PAGE_HEIGHT};
use vee_sys::testing::Harness;
use vee_sys::{Clock, Scheduler};

const CR1_SPE: u32 = 1 << 6;
const CR1_SSI: u32 = 1 << 8;
const CR1_SSM: u32 = 1 << 9;

const PIN_DC: u32 = 8;
const PIN_RST: u32 = 9;

fn new_machine() -> (VeeMachine, Harness) {
    let h = Harness::new();
    let scheduler: Rc<dyn Scheduler> = Rc::new(h.clone());
    let clock: Rc<dyn Clock> = Rc::new(h.clone());
    let machine = VeeMachine::new(scheduler, clock);
    h.drain();

    // Release RST (active-low); DC defaults low.
    machine.gpio().write_reg(GpioReg::Odr, 1 << PIN_RST);
    h.drain();
    (machine, h)
}

fn set_dc(machine: &VeeMachine, h: &Harness, dc_high: bool) {
    let odr = (1 << PIN_RST) | if dc_high { 1 << PIN_DC } else { 0 };
    machine.gpio().write_reg(GpioReg::Odr, odr);
    h.drain();
}

/// Frames `bytes` as one CS-asserted burst over the real SPI master,
/// driving DC first the way a guest would before lowering CS.
fn send_frame(machine: &VeeMachine, h: &Harness, dc_high: bool, bytes: &[u8]) {
    set_dc(machine, h, dc_high);

    machine.spi().write_reg(SpiReg::Cr1, CR1_SPE | CR1_SSM); // SSI=0: CS asserted
    h.drain();

    for &b in bytes {
        machine.spi().write_reg(SpiReg::Dr, b as u32);
        h.drain();
        h.advance_us(1);
        h.drain();
    }

    machine.spi().write_reg(SpiReg::Cr1, CR1_SPE | CR1_SSM | CR1_SSI); // CS deasserted
    h.drain();
}

/// S4 -- display-on, then a full first page of set pixels, driven through
/// real GPIO/SPI register writes rather than the display's bare pins.
#[test]
fn s4_display_on_then_page_write_through_mmio() {
    let (machine, h) = new_machine();

    send_frame(&machine, &h, false, &[0xAF]);
    assert!(machine.display().registers().display_on);

    send_frame(&machine, &h, true, &[0xFF; DISPLAY_WIDTH]);

    let (w, ht, pixels) = machine.display().export_pixels();
    assert_eq!((w, ht), (DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32));
    for column in 0..DISPLAY_WIDTH {
        for row in 0..PAGE_HEIGHT {
            assert_eq!(pixels[column * DISPLAY_HEIGHT + row], ON_COLOR, "col={column} row={row}");
        }
    }
}

/// S5 -- page addressing write at page_select=3, through MMIO.
#[test]
fn s5_page_addressing_write_through_mmio() {
    let (machine, h) = new_machine();
    send_frame(&machine, &h, false, &[0xAF]);
    send_frame(&machine, &h, false, &[0xB3]); // page_select = 3

    send_frame(&machine, &h, true, &[0x01, 0x02, 0x04, 0x08]);

    let (_, _, pixels) = machine.display().export_pixels();
    for (col, byte) in [0x01u8, 0x02, 0x04, 0x08].into_iter().enumerate() {
        let expected_row = 24 + byte.trailing_zeros() as usize;
        for row in 24..32 {
            let want = row == expected_row;
            assert_eq!(pixels[col * DISPLAY_HEIGHT + row], if want { ON_COLOR } else { 0 }, "col={col} row={row}");
        }
    }
}

/// S6 -- GPIO lock sequence, exercised on the same bank that also carries
/// the SPI/display pins, confirming the lock only blocks the registers it
/// names and doesn't interfere with AFIO-bound pins.
#[test]
fn s6_lock_sequence_latches_and_blocks_moder_and_bsrr() {
    let (machine, h) = new_machine();
    let gpio = machine.gpio();

    gpio.write_reg(GpioReg::Lckr, 0x100AA);
    gpio.write_reg(GpioReg::Lckr, 0x000AA);
    gpio.write_reg(GpioReg::Lckr, 0x100AA);
    h.drain();
    assert!(gpio.lckr_active());

    let before_moder = gpio.read_reg(GpioReg::Moder);
    gpio.write_reg(GpioReg::Moder, 0xFFFF_FFFF);
    h.drain();
    assert_eq!(gpio.read_reg(GpioReg::Moder), before_moder, "MODER write must be a no-op while latched");

    let before_odr = gpio.read_reg(GpioReg::Odr);
    gpio.write_reg(GpioReg::Bsrr, 0xFFFF);
    h.drain();
    assert_eq!(gpio.read_reg(GpioReg::Odr), before_odr, "BSRR write must be a no-op while latched");

    // The FIFO keeps shifting but can never unlatch.
    gpio.write_reg(GpioReg::Lckr, 0x12345);
    h.drain();
    assert!(gpio.lckr_active());
}

/// RST wired straight from a GPIO push-pull output through to the
/// display's own pin: driving it low resets every display register.
#[test]
fn rst_pin_reset_propagates_through_the_line() {
    let (machine, h) = new_machine();
    send_frame(&machine, &h, false, &[0xAF]);
    assert!(machine.display().registers().display_on);

    machine.gpio().write_reg(GpioReg::Odr, 0); // RST low, DC low
    h.drain();

    assert!(!machine.display().registers().display_on);
}

/// Save/restore round-trips the whole machine: GPIO registers, SPI
/// registers, and the display's control registers plus GDDRAM.
#[test]
fn snapshot_round_trips_the_whole_machine() {
    let (machine, h) = new_machine();
    send_frame(&machine, &h, false, &[0xAF]);
    send_frame(&machine, &h, true, &[0xFF; DISPLAY_WIDTH]);

    let snapshot = machine.save_snapshot();

    let (restored, h2) = new_machine();
    restored.load_snapshot(snapshot);
    h2.drain();

    assert!(restored.display().registers().display_on);
    let (_, _, pixels) = restored.display().export_pixels();
    for row in 0..PAGE_HEIGHT {
        assert_eq!(pixels[0 * DISPLAY_HEIGHT + row], ON_COLOR);
    }
}
