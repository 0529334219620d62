// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use vee_sys::Scheduler;

use crate::cell::AfioCell;

/// A GPIO port letter. Only A/B/C carry any populated alternate-function
/// cells in this subset of the reference manual's map; other ports are
/// valid GPIO banks but `AfioTable::lookup` never matches anything for
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
    C,
}

impl Port {
    pub fn from_index(port_index: u32) -> Option<Port> {
        match port_index {
            0 => Some(Port::A),
            1 => Some(Port::B),
            2 => Some(Port::C),
            _ => None,
        }
    }
}

pub struct Spi1Cells {
    pub cs: AfioCell,
    pub sck: AfioCell,
    pub miso: AfioCell,
    pub mosi: AfioCell,
}

pub struct I2c1Cells {
    pub scl: AfioCell,
    pub sda: AfioCell,
}

/// The process-wide AFIO table, scoped to the peripherals this core
/// models: one SPI1 (CS/SCK/MISO/MOSI) and one I2C1 (SCL/SDA).
pub struct AfioTable {
    pub spi1: Spi1Cells,
    pub i2c1: I2c1Cells,
}

impl AfioTable {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        AfioTable {
            spi1: Spi1Cells {
                cs: AfioCell::new(scheduler.clone()),
                sck: AfioCell::new(scheduler.clone()),
                miso: AfioCell::new(scheduler.clone()),
                mosi: AfioCell::new(scheduler.clone()),
            },
            i2c1: I2c1Cells {
                scl: AfioCell::new(scheduler.clone()),
                sda: AfioCell::new(scheduler),
            },
        }
    }

    /// Looks up the cell (if any) wired to `(port, pin, af)`, per the
    /// manufacturer's alternate-function map: PA4/PA15 (AF5) and PB nothing
    /// share SPI1_CS; PA5/PB3 (AF5) share SPI1_SCK; PA6/PB4 (AF5) share
    /// SPI1_MISO; PA7/PB5 (AF5) share SPI1_MOSI; PB6/PB8 (AF4) share
    /// I2C1_SDA; PB7/PB9 (AF4) share I2C1_SCL.
    pub fn lookup(&self, port: Port, pin: usize, af: u8) -> Option<&AfioCell> {
        use Port::*;
        match (port, pin, af) {
            (A, 4, 5) | (A, 15, 5) => Some(&self.spi1.cs),
            (A, 5, 5) | (B, 3, 5) => Some(&self.spi1.sck),
            (A, 6, 5) | (B, 4, 5) => Some(&self.spi1.miso),
            (A, 7, 5) | (B, 5, 5) => Some(&self.spi1.mosi),
            (B, 6, 4) | (B, 8, 4) => Some(&self.i2c1.sda),
            (B, 7, 4) | (B, 9, 4) => Some(&self.i2c1.scl),
            _ => None,
        }
    }
}
