// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

pub const REG_COUNT: usize = 9;

/// Word offsets into the SPI master's 0x400-byte MMIO window (CR1=0x00,
/// ..., I2SPR=0x20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SpiReg {
    Cr1 = 0,
    Cr2 = 1,
    Sr = 2,
    Dr = 3,
    Crcpr = 4,
    RxCrcr = 5,
    TxCrcr = 6,
    I2sCfgr = 7,
    I2sPr = 8,
}

impl TryFrom<usize> for SpiReg {
    type Error = ();

    fn try_from(word: usize) -> Result<Self, Self::Error> {
        use SpiReg::*;
        Ok(match word {
            0 => Cr1,
            1 => Cr2,
            2 => Sr,
            3 => Dr,
            4 => Crcpr,
            5 => RxCrcr,
            6 => TxCrcr,
            7 => I2sCfgr,
            8 => I2sPr,
            _ => return Err(()),
        })
    }
}

/// The nine persisted registers of an SPI master snapshot. Transfer
/// status and AFIO cell levels are volatile and reconstructed on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiRegisters {
    pub cr1: u32,
    pub cr2: u32,
    pub sr: u32,
    pub dr: u32,
    pub crcpr: u32,
    pub rxcrcr: u32,
    pub txcrcr: u32,
    pub i2scfgr: u32,
    pub i2spr: u32,
}

impl Default for SpiRegisters {
    fn default() -> Self {
        SpiRegisters {
            cr1: 0,
            cr2: 0,
            sr: 0x2,
            dr: 0,
            crcpr: 0x7,
            rxcrcr: 0,
            txcrcr: 0,
            i2scfgr: 0,
            i2spr: 0x2,
        }
    }
}

impl SpiRegisters {
    pub(crate) fn to_array(self) -> [u32; REG_COUNT] {
        [
            self.cr1, self.cr2, self.sr, self.dr, self.crcpr, self.rxcrcr, self.txcrcr, self.i2scfgr, self.i2spr,
        ]
    }

    pub(crate) fn from_array(regs: [u32; REG_COUNT]) -> Self {
        SpiRegisters {
            cr1: regs[SpiReg::Cr1 as usize],
            cr2: regs[SpiReg::Cr2 as usize],
            sr: regs[SpiReg::Sr as usize],
            dr: regs[SpiReg::Dr as usize],
            crcpr: regs[SpiReg::Crcpr as usize],
            rxcrcr: regs[SpiReg::RxCrcr as usize],
            txcrcr: regs[SpiReg::TxCrcr as usize],
            i2scfgr: regs[SpiReg::I2sCfgr as usize],
            i2spr: regs[SpiReg::I2sPr as usize],
        }
    }
}
