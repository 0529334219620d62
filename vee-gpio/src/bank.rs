// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use vee_afio::{AfioTable, Port};
use vee_electrical::{Direction, Pin};
use vee_sys::Scheduler;

use crate::reg::{GpioReg, GpioRegisters, REG_COUNT};

pub const PIN_COUNT: usize = 16;

/// Bit 16 of an LCKR write: the lock-key bit ("LCKK") that must follow the
/// {1,0,1} pattern across three consecutive writes to latch the lock.
const LCKK_BIT: u32 = 1 << 16;

/// A bank of 16 pins backed by ten memory-mapped registers.
pub struct GpioBank {
    id: u64,
    port: Option<Port>,
    port_index: u32,
    afio: Rc<AfioTable>,
    regs: RefCell<[u32; REG_COUNT]>,
    lckr_sequence: RefCell<[u32; 3]>,
    lckr_active: Cell<bool>,
    pins: Vec<Rc<Pin>>,
    self_weak: RefCell<Weak<GpioBank>>,
}

impl GpioBank {
    /// Parses the `port-index` device property (default 0).
    pub fn parse_port_index(raw: &str) -> Result<u32, vee_sys::property::PropertyError> {
        vee_sys::property::parse_u32_property("port-index", raw, 0)
    }

    pub fn new(port_index: u32, scheduler: Rc<dyn Scheduler>, afio: Rc<AfioTable>) -> Rc<Self> {
        let pins: Vec<Rc<Pin>> = (0..PIN_COUNT).map(|_| Pin::new(scheduler.clone())).collect();
        let bank = Rc::new(GpioBank {
            id: vee_afio::next_bank_id(),
            port: Port::from_index(port_index),
            port_index,
            afio,
            regs: RefCell::new([0; REG_COUNT]),
            lckr_sequence: RefCell::new([0; 3]),
            lckr_active: Cell::new(false),
            pins,
            self_weak: RefCell::new(Weak::new()),
        });
        *bank.self_weak.borrow_mut() = Rc::downgrade(&bank);

        // The only writer to IDR for a wired pin: its own in-voltage changes,
        // driven by whatever Line it sits on.
        for (idx, pin) in bank.pins.iter().enumerate() {
            let weak = bank.self_weak.borrow().clone();
            pin.set_on_in_change(Rc::new(move || {
                if let Some(bank) = weak.upgrade() {
                    bank.update_idr_from_pin(idx);
                }
            }));
        }

        bank
    }

    pub fn port_index(&self) -> u32 {
        self.port_index
    }

    pub fn pins(&self) -> &[Rc<Pin>] {
        &self.pins
    }

    pub fn lckr_active(&self) -> bool {
        self.lckr_active.get()
    }

    pub fn read_reg(&self, reg: GpioReg) -> u32 {
        self.regs.borrow()[reg as usize]
    }

    pub fn mmio_read(&self, byte_offset: u32) -> u32 {
        match GpioReg::try_from((byte_offset >> 2) as usize) {
            Ok(reg) => self.read_reg(reg),
            Err(()) => {
                log::warn!("vee-gpio: read of unmapped offset {byte_offset:#x}");
                0
            }
        }
    }

    pub fn mmio_write(&self, byte_offset: u32, val: u32) {
        match GpioReg::try_from((byte_offset >> 2) as usize) {
            Ok(reg) => self.write_reg(reg, val),
            Err(()) => log::warn!("vee-gpio: write of unmapped offset {byte_offset:#x}"),
        }
    }

    /// Decodes one register write per the bank's memory map.
    pub fn write_reg(&self, reg: GpioReg, val: u32) {
        match reg {
            GpioReg::Idr => {
                log::trace!("vee-gpio: ignoring write to read-only IDR");
            }
            GpioReg::Lckr => self.handle_lckr_write(val),
            GpioReg::Bsrr => {
                if self.lckr_active.get() {
                    return;
                }
                let odr = self.regs.borrow()[GpioReg::Odr as usize];
                let new_odr = (odr | (val & 0xFFFF)) & !((val >> 16) & 0xFFFF);
                self.store_and_rearbitrate(GpioReg::Odr, new_odr);
            }
            GpioReg::Moder
            | GpioReg::Otyper
            | GpioReg::Ospeedr
            | GpioReg::Pupdr
            | GpioReg::Odr
            | GpioReg::Afrl
            | GpioReg::Afrh => {
                if self.lckr_active.get() {
                    return;
                }
                self.store_and_rearbitrate(reg, val);
            }
        }
    }

    fn store_and_rearbitrate(&self, reg: GpioReg, val: u32) {
        let changed = {
            let mut regs = self.regs.borrow_mut();
            if regs[reg as usize] == val {
                false
            } else {
                regs[reg as usize] = val;
                true
            }
        };
        if !changed {
            return;
        }
        if reg == GpioReg::Afrl || reg == GpioReg::Afrh {
            self.rebind_afio(reg);
        }
        self.arbitrate_all();
    }

    /// Feeds the 3-deep lock-key FIFO. Unlike every other register, LCKR
    /// keeps accepting writes even while `lckr_active` is set -- they
    /// continue to shift the FIFO but can never unlatch it.
    fn handle_lckr_write(&self, val: u32) {
        let (newest, mid, oldest) = {
            let mut seq = self.lckr_sequence.borrow_mut();
            seq[2] = seq[1];
            seq[1] = seq[0];
            seq[0] = val;
            (seq[0], seq[1], seq[2])
        };
        let low_match = (newest & 0xFFFF) == (mid & 0xFFFF) && (newest & 0xFFFF) == (oldest & 0xFFFF);
        if newest & LCKK_BIT != 0 && mid & LCKK_BIT == 0 && oldest & LCKK_BIT != 0 && low_match {
            self.lckr_active.set(true);
        }
        self.regs.borrow_mut()[GpioReg::Lckr as usize] = val;
    }

    /// Rebinds every AFIO cell selected by the half of AFRL/AFRH that was
    /// just written, releasing each cell's previous notifier in favor of
    /// one that re-arbitrates the newly bound pin.
    fn rebind_afio(&self, half: GpioReg) {
        let Some(port) = self.port else { return };
        let (start, reg) = match half {
            GpioReg::Afrl => (0, GpioReg::Afrl),
            GpioReg::Afrh => (8, GpioReg::Afrh),
            _ => unreachable!("rebind_afio only called for AFRL/AFRH"),
        };
        let reg_val = self.regs.borrow()[reg as usize];
        for p in start..start + 8 {
            let af = ((reg_val >> ((p - start) * 4)) & 0xF) as u8;
            if let Some(cell) = self.afio.lookup(port, p, af) {
                let weak = self.self_weak.borrow().clone();
                cell.bind(
                    self.id,
                    p,
                    &self.pins[p],
                    Rc::new(move || {
                        if let Some(bank) = weak.upgrade() {
                            bank.arbitrate_pin(p);
                        }
                    }),
                );
            }
        }
    }

    fn arbitrate_all(&self) {
        for p in 0..PIN_COUNT {
            self.arbitrate_pin(p);
        }
    }

    /// Recomputes pin `p`'s electrical status from the current registers
    /// and (for alternate-function mode) the AFIO table, then applies the
    /// write-back rule for unwired pins.
    fn arbitrate_pin(&self, p: usize) {
        let regs = *self.regs.borrow();
        let mode = (regs[GpioReg::Moder as usize] >> (p * 2)) & 0b11;
        let otype = (regs[GpioReg::Otyper as usize] >> p) & 1;
        let pupd = (regs[GpioReg::Pupdr as usize] >> (p * 2)) & 0b11;
        let od = (regs[GpioReg::Odr as usize] >> p) & 1;
        let af = if p < 8 {
            (regs[GpioReg::Afrl as usize] >> (p * 4)) & 0xF
        } else {
            (regs[GpioReg::Afrh as usize] >> ((p - 8) * 4)) & 0xF
        } as u8;

        let (direction, out_voltage_mv, out_current_ma) = match mode {
            0b00 => {
                // Input: an unwired input pin reads back its pull value.
                let pulled_up = pupd == 0b00 || pupd == 0b01;
                (Direction::In, if pulled_up { 3300 } else { 0 }, 0)
            }
            0b01 => Self::drive(otype, od as u8, pupd),
            0b10 => {
                let cell = self.port.and_then(|port| self.afio.lookup(port, p, af));
                match cell {
                    Some(cell) if cell.is_bound_to(self.id, p) => Self::drive(otype, cell.level(), pupd),
                    _ => (Direction::Out, 0, 0),
                }
            }
            _ => (Direction::HighImpedance, 0, 0), // Analog
        };

        let pin = &self.pins[p];
        pin.set_output(direction, out_voltage_mv, out_current_ma);

        // Write-back rule: an output with no external circuit reflects
        // straight back into IDR; a wired pin's IDR bit is instead driven
        // only by the Line, through `update_idr_from_pin`.
        if !pin.has_extern_circuit() {
            self.set_idr_bit(p, out_voltage_mv != 0);
        }
    }

    /// Shared push-pull/open-drain drive logic for push-pull-output mode
    /// and alternate-function-output mode (which differ only in where the
    /// drive level comes from: ODR vs. the bound AFIO cell's level).
    fn drive(otype: u32, level: u8, pupd: u32) -> (Direction, u32, u32) {
        if level == 0 {
            return (Direction::Out, 0, 0);
        }
        if otype == 0 {
            // push-pull
            (Direction::Out, 3300, 20)
        } else {
            // open-drain
            let pulled_up = pupd == 0b00 || pupd == 0b01;
            (Direction::Out, if pulled_up { 3300 } else { 0 }, 0)
        }
    }

    fn update_idr_from_pin(&self, p: usize) {
        let nonzero = self.pins[p].in_voltage_mv() != 0;
        self.set_idr_bit(p, nonzero);
    }

    fn set_idr_bit(&self, p: usize, set: bool) {
        let mut regs = self.regs.borrow_mut();
        let mask = 1u32 << p;
        regs[GpioReg::Idr as usize] = if set {
            regs[GpioReg::Idr as usize] | mask
        } else {
            regs[GpioReg::Idr as usize] & !mask
        };
    }

    pub fn save_registers(&self) -> GpioRegisters {
        GpioRegisters::from_array(*self.regs.borrow())
    }

    /// Restores the ten persisted registers and reconstructs everything
    /// volatile from them: AFIO bindings are rebuilt and every pin is
    /// re-arbitrated. The lock latch itself is not part of the persisted
    /// register set, so a restored bank always comes back unlatched.
    pub fn load_registers(&self, regs: GpioRegisters) {
        *self.regs.borrow_mut() = regs.to_array();
        self.lckr_active.set(false);
        *self.lckr_sequence.borrow_mut() = [0; 3];
        self.rebind_afio(GpioReg::Afrl);
        self.rebind_afio(GpioReg::Afrh);
        self.arbitrate_all();
    }
}
