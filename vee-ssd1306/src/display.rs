// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use vee_electrical::{Direction, Pin};
use vee_sys::Scheduler;

use crate::reg::{MemoryAddressingMode, Ssd1306Registers};
use crate::{DISPLAY_HEIGHT, DISPLAY_WIDTH, ON_COLOR, PAGE_COUNT, PAGE_HEIGHT};

const CMD_BUFFER_CAP: usize = 4095;

/// SPI-attached SSD1306. Owns its five electrical pins (CS, SCK, MOSI, DC,
/// RST) directly; a caller wires them to a GPIO bank's AFIO-bound pins via
/// a [`vee_electrical::Line`].
pub struct Ssd1306 {
    spi_path: String,
    cs: Rc<Pin>,
    sck: Rc<Pin>,
    mosi: Rc<Pin>,
    dc: Rc<Pin>,
    rst: Rc<Pin>,
    bits_remain: Cell<u8>,
    rx_shift: Cell<u8>,
    cmd_buffer: RefCell<Vec<u8>>,
    regs: RefCell<Ssd1306Registers>,
    gddram: RefCell<Vec<bool>>,
    self_weak: RefCell<Weak<Ssd1306>>,
}

/// Persisted display state: the control registers plus the pixel buffer
/// and any command bytes accumulated mid-frame. Not named by the core's
/// memory-mapped register model (SSD1306 has no MMIO window of its own),
/// but carried across snapshots for the same reason GPIO and SPI registers
/// are -- restoring a VM should not blank every attached display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ssd1306Snapshot {
    pub regs: Ssd1306Registers,
    pub gddram: Vec<bool>,
    pub cmd_buffer: Vec<u8>,
}

impl Ssd1306 {
    pub fn new(scheduler: Rc<dyn Scheduler>, spi_path: impl Into<String>) -> Rc<Self> {
        let make_pin = || {
            let pin = Pin::new(scheduler.clone());
            // A non-contending observer on whatever Line it's wired to: by
            // always presenting the supply voltage on its own output side,
            // this pin never drags the wired-AND below the actual driver.
            pin.set_output(Direction::In, 3300, 0);
            pin
        };

        let display = Rc::new(Ssd1306 {
            spi_path: spi_path.into(),
            cs: make_pin(),
            sck: make_pin(),
            mosi: make_pin(),
            dc: make_pin(),
            rst: make_pin(),
            bits_remain: Cell::new(8),
            rx_shift: Cell::new(0),
            cmd_buffer: RefCell::new(Vec::new()),
            regs: RefCell::new(Ssd1306Registers::default()),
            gddram: RefCell::new(vec![false; DISPLAY_WIDTH * DISPLAY_HEIGHT]),
            self_weak: RefCell::new(Weak::new()),
        });
        *display.self_weak.borrow_mut() = Rc::downgrade(&display);

        let weak = display.self_weak.borrow().clone();
        let w = weak.clone();
        display.cs.set_on_in_change(Rc::new(move || {
            if let Some(d) = w.upgrade() {
                d.on_cs_change();
            }
        }));
        let w = weak.clone();
        display.sck.set_on_in_change(Rc::new(move || {
            if let Some(d) = w.upgrade() {
                d.on_sck_change();
            }
        }));
        let w = weak;
        display.rst.set_on_in_change(Rc::new(move || {
            if let Some(d) = w.upgrade() {
                d.on_rst_change();
            }
        }));

        display
    }

    pub fn spi_path(&self) -> &str {
        &self.spi_path
    }

    pub fn cs(&self) -> &Rc<Pin> {
        &self.cs
    }

    pub fn sck(&self) -> &Rc<Pin> {
        &self.sck
    }

    pub fn mosi(&self) -> &Rc<Pin> {
        &self.mosi
    }

    pub fn dc(&self) -> &Rc<Pin> {
        &self.dc
    }

    pub fn rst(&self) -> &Rc<Pin> {
        &self.rst
    }

    pub fn registers(&self) -> Ssd1306Registers {
        *self.regs.borrow()
    }

    /// CS is active-low. A falling edge starts framing a fresh byte; a
    /// rising edge stops it and, if any bytes were accumulated, interprets
    /// the buffer as a command or a GDDRAM write per the DC pin's level
    /// sampled at this instant.
    fn on_cs_change(&self) {
        if self.cs.in_voltage_mv() > 0 {
            self.on_cs_rise();
        } else {
            self.on_cs_fall();
        }
    }

    fn on_cs_fall(&self) {
        self.bits_remain.set(8);
        self.rx_shift.set(0);
    }

    fn on_cs_rise(&self) {
        if !self.cmd_buffer.borrow().is_empty() {
            if self.dc.in_voltage_mv() > 0 {
                self.write_gddram();
            } else {
                self.interpret_command();
            }
        }
        self.cmd_buffer.borrow_mut().clear();
    }

    /// Only rising SCK edges are meaningful while CS is asserted: this
    /// component never drives MISO, so a falling edge (the master's
    /// shift-out phase) has nothing for it to do.
    fn on_sck_change(&self) {
        if self.cs.in_voltage_mv() > 0 {
            return;
        }
        if self.sck.in_voltage_mv() > 0 {
            self.on_sck_rise();
        }
    }

    fn on_sck_rise(&self) {
        let bit = if self.mosi.in_voltage_mv() > 0 { 1u8 } else { 0u8 };
        let pos = self.bits_remain.get() - 1;
        self.rx_shift.set(self.rx_shift.get() | (bit << pos));
        self.bits_remain.set(pos);
        if pos != 0 {
            return;
        }

        let byte = self.rx_shift.get();
        self.rx_shift.set(0);
        self.bits_remain.set(8);
        let mut buf = self.cmd_buffer.borrow_mut();
        if buf.len() < CMD_BUFFER_CAP {
            buf.push(byte);
        }
    }

    /// The handler only runs when `in_voltage_mv` actually changes, so a
    /// low reading here always means a fall just happened.
    fn on_rst_change(&self) {
        if self.rst.in_voltage_mv() == 0 {
            self.reset_state();
        }
    }

    fn reset_state(&self) {
        self.cmd_buffer.borrow_mut().clear();
        *self.regs.borrow_mut() = Ssd1306Registers::default();
        self.gddram.borrow_mut().iter_mut().for_each(|p| *p = false);
        self.bits_remain.set(8);
        self.rx_shift.set(0);
    }

    fn interpret_command(&self) {
        let buf = self.cmd_buffer.borrow();
        if buf.is_empty() {
            return;
        }
        let code = buf[0];
        let arg1 = buf.get(1).copied();
        let arg2 = buf.get(2).copied();
        drop(buf);

        let mut regs = self.regs.borrow_mut();
        match code {
            0x00..=0x0F => regs.lower_column_start = code & 0xF,
            0x10..=0x1F => regs.higher_column_start = code & 0xF,
            0x20 => {
                if let Some(a) = arg1 {
                    regs.memory_addressing_mode = MemoryAddressingMode::from_bits(a);
                }
            }
            0x21 => {
                if let Some(a) = arg1 {
                    regs.column_start = a & 0x7;
                }
                if let Some(a) = arg2 {
                    regs.column_end = a & 0x7;
                }
            }
            0x22 => {
                if let Some(a) = arg1 {
                    regs.page_start = a & 0x7;
                }
                if let Some(a) = arg2 {
                    regs.page_end = a & 0x7;
                }
            }
            0xA4 | 0xA5 => regs.display_gddram = code == 0xA4,
            0xA6 | 0xA7 => regs.display_inverse = code != 0xA6,
            0xAE | 0xAF => regs.display_on = code == 0xAF,
            0xB0..=0xB7 => regs.page_select = code & 0x7,
            _ => log::trace!("vee-ssd1306: unknown command {code:#04x} ignored"),
        }
    }

    fn write_gddram(&self) {
        let regs = *self.regs.borrow();
        let buf = self.cmd_buffer.borrow();
        match regs.memory_addressing_mode {
            MemoryAddressingMode::Horizontal => {
                let mut data_idx = 0usize;
                'outer: for page in regs.page_start..regs.page_end {
                    for column in regs.column_start..regs.column_end {
                        if data_idx >= buf.len() {
                            break 'outer;
                        }
                        self.write_column_byte(column as usize, page as usize, buf[data_idx]);
                        data_idx += 1;
                    }
                }
            }
            MemoryAddressingMode::Vertical => {
                let mut data_idx = 0usize;
                'outer: for column in regs.column_start..regs.column_end {
                    for page in regs.page_start..regs.page_end {
                        if data_idx >= buf.len() {
                            break 'outer;
                        }
                        self.write_column_byte(column as usize, page as usize, buf[data_idx]);
                        data_idx += 1;
                    }
                }
            }
            MemoryAddressingMode::Page => {
                let start_col = ((regs.higher_column_start as usize) << 4) | regs.lower_column_start as usize;
                for (data_idx, column) in (start_col..DISPLAY_WIDTH).enumerate() {
                    if data_idx >= buf.len() {
                        break;
                    }
                    self.write_column_byte(column, regs.page_select as usize, buf[data_idx]);
                }
            }
        }
    }

    /// Writes one byte's 8 vertical pixels at `(column, page*8 .. page*8+8)`.
    fn write_column_byte(&self, column: usize, page: usize, byte: u8) {
        if column >= DISPLAY_WIDTH || page >= PAGE_COUNT {
            return;
        }
        let mut gddram = self.gddram.borrow_mut();
        for k in 0..PAGE_HEIGHT {
            let row = page * PAGE_HEIGHT + k;
            gddram[row * DISPLAY_WIDTH + column] = (byte >> k) & 1 != 0;
        }
    }

    /// Returns `(width, height, pixels)` with `pixels` in column-major
    /// order (width outer, height inner).
    pub fn export_pixels(&self) -> (u32, u32, Vec<u32>) {
        let regs = *self.regs.borrow();
        let mut pixels = Vec::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT);
        if !regs.display_on {
            pixels.resize(DISPLAY_WIDTH * DISPLAY_HEIGHT, 0);
        } else if !regs.display_gddram {
            pixels.resize(DISPLAY_WIDTH * DISPLAY_HEIGHT, ON_COLOR);
        } else {
            let gddram = self.gddram.borrow();
            for column in 0..DISPLAY_WIDTH {
                for row in 0..DISPLAY_HEIGHT {
                    let set = gddram[row * DISPLAY_WIDTH + column];
                    let value = if set { ON_COLOR } else { 0 };
                    pixels.push(if regs.display_inverse { value ^ ON_COLOR } else { value });
                }
            }
        }
        (DISPLAY_WIDTH as u32, DISPLAY_HEIGHT as u32, pixels)
    }

    pub fn save_snapshot(&self) -> Ssd1306Snapshot {
        Ssd1306Snapshot {
            regs: *self.regs.borrow(),
            gddram: self.gddram.borrow().clone(),
            cmd_buffer: self.cmd_buffer.borrow().clone(),
        }
    }

    pub fn load_snapshot(&self, snapshot: Ssd1306Snapshot) {
        *self.regs.borrow_mut() = snapshot.regs;
        *self.gddram.borrow_mut() = snapshot.gddram;
        *self.cmd_buffer.borrow_mut() = snapshot.cmd_buffer;
        self.bits_remain.set(8);
        self.rx_shift.set(0);
    }
}
