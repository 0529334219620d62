// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

pub const REG_COUNT: usize = 10;

/// Word offsets into a GPIO bank's 0x400-byte MMIO window (MODER=0x00, ...,
/// AFRH=0x24), in register-manual order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum GpioReg {
    Moder = 0,
    Otyper = 1,
    Ospeedr = 2,
    Pupdr = 3,
    Idr = 4,
    Odr = 5,
    Bsrr = 6,
    Lckr = 7,
    Afrl = 8,
    Afrh = 9,
}

impl TryFrom<usize> for GpioReg {
    type Error = ();

    fn try_from(word: usize) -> Result<Self, Self::Error> {
        use GpioReg::*;
        Ok(match word {
            0 => Moder,
            1 => Otyper,
            2 => Ospeedr,
            3 => Pupdr,
            4 => Idr,
            5 => Odr,
            6 => Bsrr,
            7 => Lckr,
            8 => Afrl,
            9 => Afrh,
            _ => return Err(()),
        })
    }
}

/// The ten persisted registers of a GPIO bank snapshot. Volatile state
/// (pin statuses, AFIO bindings, the lock FIFO) is reconstructed from
/// these on restore rather than persisted itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioRegisters {
    pub moder: u32,
    pub otyper: u32,
    pub ospeedr: u32,
    pub pupdr: u32,
    pub idr: u32,
    pub odr: u32,
    pub bsrr: u32,
    pub lckr: u32,
    pub afrl: u32,
    pub afrh: u32,
}

impl GpioRegisters {
    pub(crate) fn to_array(self) -> [u32; REG_COUNT] {
        [
            self.moder,
            self.otyper,
            self.ospeedr,
            self.pupdr,
            self.idr,
            self.odr,
            self.bsrr,
            self.lckr,
            self.afrl,
            self.afrh,
        ]
    }

    pub(crate) fn from_array(regs: [u32; REG_COUNT]) -> Self {
        GpioRegisters {
            moder: regs[GpioReg::Moder as usize],
            otyper: regs[GpioReg::Otyper as usize],
            ospeedr: regs[GpioReg::Ospeedr as usize],
            pupdr: regs[GpioReg::Pupdr as usize],
            idr: regs[GpioReg::Idr as usize],
            odr: regs[GpioReg::Odr as usize],
            bsrr: regs[GpioReg::Bsrr as usize],
            lckr: regs[GpioReg::Lckr as usize],
            afrl: regs[GpioReg::Afrl as usize],
            afrh: regs[GpioReg::Afrh as usize],
        }
    }
}
