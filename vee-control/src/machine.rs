// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use vee_afio::AfioTable;
use vee_electrical::Line;
use vee_gpio::{GpioBank, GpioReg, GpioRegisters};
use vee_spi::{SpiMaster, SpiRegisters};
use vee_ssd1306::Ssd1306;
use vee_ssd1306::Ssd1306Snapshot;
use vee_sys::{Clock, Scheduler};

// Fixed board wiring: GPIO port A, pins 4/5/7 bound to SPI1's CS/SCK/MOSI
// (alternate function 5, per the populated subset of the reference
// manual's map -- see `vee_afio::AfioTable::lookup`), pins 8/9 as plain
// push-pull outputs driving the display's DC/RST. MISO (pin 6) is left
// unbound: this machine's one SPI peripheral, the SSD1306, never talks
// back on it.
const PIN_CS: usize = 4;
const PIN_SCK: usize = 5;
const PIN_MOSI: usize = 7;
const PIN_DC: usize = 8;
const PIN_RST: usize = 9;
const SPI1_AF: u32 = 5;

const MODE_AF: u32 = 0b10;
const MODE_OUTPUT: u32 = 0b01;

/// One GPIO bank, one SPI master, and one SSD1306, wired together exactly
/// as a real board would be: the guest only ever sees the GPIO and SPI
/// MMIO windows, and the display responds purely through the electrical
/// side.
pub struct VeeMachine {
    scheduler: Rc<dyn Scheduler>,
    clock: Rc<dyn Clock>,
    afio: Rc<AfioTable>,
    gpio: Rc<GpioBank>,
    spi: Rc<SpiMaster>,
    display: Rc<Ssd1306>,
    // Lines hold only weak back-references to themselves in the pins they
    // arbitrate; nothing else would keep them alive.
    _lines: Vec<Rc<Line>>,
}

/// Persisted state for the whole machine. Matches what each component
/// already calls out as its own snapshot surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub gpio: GpioRegisters,
    pub spi: SpiRegisters,
    pub display: Ssd1306Snapshot,
}

impl VeeMachine {
    /// Builds and wires the machine. The caller must drain `scheduler`
    /// once after construction (the initial register writes below defer
    /// their arbitration, same as any other memory-mapped write).
    pub fn new(scheduler: Rc<dyn Scheduler>, clock: Rc<dyn Clock>) -> VeeMachine {
        let afio = Rc::new(AfioTable::new(scheduler.clone()));
        let gpio = GpioBank::new(0, scheduler.clone(), afio.clone());
        let spi = SpiMaster::new(0, scheduler.clone(), afio.clone());
        let display = Ssd1306::new(scheduler.clone(), "machine/spi0");

        // Wired before the mode registers are programmed: a `Line` only
        // arbitrates in response to a pin's `on_out_change`, so it must
        // already be listening when these first register writes give each
        // pin its first real (non-default) output status.
        let lines = vec![
            Line::new(vec![gpio.pins()[PIN_CS].clone(), display.cs().clone()]),
            Line::new(vec![gpio.pins()[PIN_SCK].clone(), display.sck().clone()]),
            Line::new(vec![gpio.pins()[PIN_MOSI].clone(), display.mosi().clone()]),
            Line::new(vec![gpio.pins()[PIN_DC].clone(), display.dc().clone()]),
            Line::new(vec![gpio.pins()[PIN_RST].clone(), display.rst().clone()]),
        ];

        let moder = (MODE_AF << (PIN_CS * 2))
            | (MODE_AF << (PIN_SCK * 2))
            | (MODE_AF << (PIN_MOSI * 2))
            | (MODE_OUTPUT << (PIN_DC * 2))
            | (MODE_OUTPUT << (PIN_RST * 2));
        gpio.write_reg(GpioReg::Moder, moder);

        let afrl = (SPI1_AF << (PIN_CS * 4)) | (SPI1_AF << (PIN_SCK * 4)) | (SPI1_AF << (PIN_MOSI * 4));
        gpio.write_reg(GpioReg::Afrl, afrl);

        VeeMachine {
            scheduler,
            clock,
            afio,
            gpio,
            spi,
            display,
            _lines: lines,
        }
    }

    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn afio(&self) -> &Rc<AfioTable> {
        &self.afio
    }

    pub fn gpio(&self) -> &Rc<GpioBank> {
        &self.gpio
    }

    pub fn spi(&self) -> &Rc<SpiMaster> {
        &self.spi
    }

    pub fn display(&self) -> &Rc<Ssd1306> {
        &self.display
    }

    /// `gpio.mmio_write`/`gpio.mmio_read` and `spi.mmio_write`/`mmio_read`
    /// are exposed directly by their owning crates; dispatching a guest
    /// access between the two MMIO windows (address-range routing) is the
    /// host memory-region dispatcher's job, out of scope here.
    pub fn save_snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            gpio: self.gpio.save_registers(),
            spi: self.spi.save_registers(),
            display: self.display.save_snapshot(),
        }
    }

    pub fn load_snapshot(&self, snapshot: MachineSnapshot) {
        self.gpio.load_registers(snapshot.gpio);
        self.spi.load_registers(snapshot.spi);
        self.display.load_snapshot(snapshot.display);
    }
}
