// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use vee_electrical::Pin;
use vee_sys::Scheduler;

/// Callback run (deferred) when a bound cell's level changes.
pub type AfioNotifier = Rc<dyn Fn()>;

struct Binding {
    bank_id: u64,
    pin_idx: usize,
    notifier: AfioNotifier,
    pin: Weak<Pin>,
}

/// One logical 0/1 channel of an on-chip peripheral, optionally bound to a
/// GPIO pin currently configured for that alternate function.
pub struct AfioCell {
    scheduler: Rc<dyn Scheduler>,
    level: Cell<u8>,
    binding: RefCell<Option<Binding>>,
}

impl AfioCell {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        AfioCell {
            scheduler,
            level: Cell::new(0),
            binding: RefCell::new(None),
        }
    }

    pub fn level(&self) -> u8 {
        self.level.get()
    }

    /// Drives this cell's logical level, e.g. from the SPI master's CR1
    /// write or its bit-clock handler. Schedules the bound pin's
    /// re-arbitration iff the level actually changed.
    pub fn set_level(&self, level: u8) {
        if self.level.get() == level {
            return;
        }
        self.level.set(level);
        if let Some(binding) = self.binding.borrow().as_ref() {
            let notifier = binding.notifier.clone();
            self.scheduler.defer(Box::new(move || notifier()));
        }
    }

    /// Rebinds this cell to `(bank_id, pin_idx)`, releasing any previous
    /// binding's notifier in favor of the new one. `pin` is the actual
    /// bound pin, kept as a weak handle so the SPI master (or any other
    /// consumer of a cell) can sample its electrical input side -- see
    /// [`AfioCell::sampled_mv`].
    pub fn bind(&self, bank_id: u64, pin_idx: usize, pin: &Rc<Pin>, notifier: AfioNotifier) {
        *self.binding.borrow_mut() = Some(Binding {
            bank_id,
            pin_idx,
            notifier,
            pin: Rc::downgrade(pin),
        });
    }

    /// Whether this cell is currently bound to exactly `(bank_id, pin_idx)`.
    /// The back-reference check that rejects a stale alternate-function
    /// binding left in the table by a pin that has since been
    /// reconfigured elsewhere.
    pub fn is_bound_to(&self, bank_id: u64, pin_idx: usize) -> bool {
        matches!(self.binding.borrow().as_ref(), Some(b) if b.bank_id == bank_id && b.pin_idx == pin_idx)
    }

    /// The input voltage of the pin currently bound to this cell, or 0 if
    /// nothing is bound (or the bound pin has since been dropped). Used by
    /// the SPI master to sample AFIO.MISO.
    pub fn sampled_mv(&self) -> u32 {
        self.binding
            .borrow()
            .as_ref()
            .and_then(|b| b.pin.upgrade())
            .map(|p| p.in_voltage_mv())
            .unwrap_or(0)
    }
}
