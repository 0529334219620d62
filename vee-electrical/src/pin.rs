// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::RefCell;
use std::rc::Rc;

use vee_sys::Scheduler;

/// A pin's electrical direction, as last computed by whatever owns it
/// (GPIO arbitration, the SPI state machines, or a fixed initial value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    HighImpedance,
    Out,
    In,
}

/// A pin-change callback. Reference-counted so the same handler can be
/// cheaply cloned into a deferred closure without re-allocating.
pub type PinHandler = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct OutputStatus {
    direction: Direction,
    out_voltage_mv: u32,
    out_current_ma: u32,
}

/// An elemental electrical endpoint.
///
/// A pin's output side (`direction`, `out_voltage_mv`, `out_current_ma`) is
/// written by whatever owns it electrically -- GPIO arbitration, the SPI
/// master's bit-clock handler, or a test harness standing in for an
/// external driver. Its input side (`in_voltage_mv`) is written only by a
/// `Line` the pin sits on. Both sides are idempotent: writing the same
/// value again fires no handler.
pub struct Pin {
    scheduler: Rc<dyn Scheduler>,
    output: RefCell<OutputStatus>,
    in_voltage_mv: RefCell<u32>,
    has_extern_circuit: RefCell<bool>,
    on_out_change: RefCell<Option<PinHandler>>,
    on_in_change: RefCell<Option<PinHandler>>,
}

impl Pin {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Rc<Self> {
        Rc::new(Pin {
            scheduler,
            output: RefCell::new(OutputStatus::default()),
            in_voltage_mv: RefCell::new(0),
            has_extern_circuit: RefCell::new(false),
            on_out_change: RefCell::new(None),
            on_in_change: RefCell::new(None),
        })
    }

    pub fn direction(&self) -> Direction {
        self.output.borrow().direction
    }

    pub fn out_voltage_mv(&self) -> u32 {
        self.output.borrow().out_voltage_mv
    }

    pub fn out_current_ma(&self) -> u32 {
        self.output.borrow().out_current_ma
    }

    pub fn in_voltage_mv(&self) -> u32 {
        *self.in_voltage_mv.borrow()
    }

    pub fn has_extern_circuit(&self) -> bool {
        *self.has_extern_circuit.borrow()
    }

    /// Set by a `Line` at construction time; marks that this pin's input
    /// side is now driven externally, so GPIO arbitration must not
    /// self-loopback its output into its own input register.
    pub fn set_has_extern_circuit(&self, value: bool) {
        *self.has_extern_circuit.borrow_mut() = value;
    }

    pub fn set_on_out_change(&self, handler: PinHandler) {
        *self.on_out_change.borrow_mut() = Some(handler);
    }

    pub fn set_on_in_change(&self, handler: PinHandler) {
        *self.on_in_change.borrow_mut() = Some(handler);
    }

    /// Drives this pin's output side. No-op (no handler fires) if the
    /// resulting status is identical to the current one.
    pub fn set_output(&self, direction: Direction, out_voltage_mv: u32, out_current_ma: u32) {
        let new = OutputStatus {
            direction,
            out_voltage_mv,
            out_current_ma,
        };
        let changed = {
            let mut cur = self.output.borrow_mut();
            if *cur == new {
                false
            } else {
                *cur = new;
                true
            }
        };
        if changed {
            self.fire(&self.on_out_change);
        }
    }

    /// Drives this pin's input side. Only ever called by the `Line` the
    /// pin is wired to.
    pub fn set_in_voltage_mv(&self, mv: u32) {
        let changed = {
            let mut cur = self.in_voltage_mv.borrow_mut();
            if *cur == mv {
                false
            } else {
                *cur = mv;
                true
            }
        };
        if changed {
            self.fire(&self.on_in_change);
        }
    }

    fn fire(&self, handler: &RefCell<Option<PinHandler>>) {
        if let Some(h) = handler.borrow().clone() {
            self.scheduler.defer(Box::new(move || h()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use vee_sys::testing::Harness;

    #[test]
    fn idempotent_output_write_fires_no_handler() {
        let h = Harness::new();
        let pin = Pin::new(Rc::new(h.clone()));
        let fired = Rc::new(Cell::new(0));
        let fired2 = fired.clone();
        pin.set_on_out_change(Rc::new(move || fired2.set(fired2.get() + 1)));

        pin.set_output(Direction::Out, 3300, 20);
        h.drain();
        assert_eq!(fired.get(), 1);

        pin.set_output(Direction::Out, 3300, 20);
        h.drain();
        assert_eq!(fired.get(), 1, "repeating the same status must not re-fire");
    }

    #[test]
    fn out_change_handler_runs_deferred_not_synchronous() {
        let h = Harness::new();
        let pin = Pin::new(Rc::new(h.clone()));
        let fired = Rc::new(Cell::new(false));
        let fired2 = fired.clone();
        pin.set_on_out_change(Rc::new(move || fired2.set(true)));

        pin.set_output(Direction::Out, 3300, 0);
        assert!(!fired.get(), "handler must not run synchronously");
        h.drain();
        assert!(fired.get());
    }
}
