// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A deterministic, in-process `Clock` + `Scheduler` for tests.
//!
//! Mirrors the "manual clock plus explicit pump" pattern used to test
//! device models without a real event loop: nothing runs until someone
//! asks it to.

use crate::{Clock, DeferredFn, Scheduler};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

struct Timer {
    expiry_us: u64,
    seq: u64,
    f: DeferredFn,
}

struct Inner {
    now_us: Cell<u64>,
    deferred: RefCell<VecDeque<DeferredFn>>,
    timers: RefCell<Vec<Timer>>,
    next_seq: Cell<u64>,
}

/// A single-threaded test double for the host event loop.
///
/// Cheap to clone (it's an `Rc`), so it can be handed to every component
/// under test while still sharing one queue and one clock.
#[derive(Clone)]
pub struct Harness(Rc<Inner>);

impl Harness {
    pub fn new() -> Self {
        Harness(Rc::new(Inner {
            now_us: Cell::new(0),
            deferred: RefCell::new(VecDeque::new()),
            timers: RefCell::new(Vec::new()),
            next_seq: Cell::new(0),
        }))
    }

    /// Runs every pending deferred callback, including ones newly deferred
    /// by callbacks that ran during this call, until the queue is empty.
    /// Does not advance the clock or fire timers.
    pub fn drain(&self) {
        loop {
            let next = self.0.deferred.borrow_mut().pop_front();
            match next {
                Some(f) => f(),
                None => break,
            }
        }
    }

    /// Advances the virtual clock by `delta_us`, firing any timer whose
    /// expiry has been reached (earliest expiry first, ties broken by
    /// scheduling order), draining deferred work after each one, until
    /// nothing is left to do at or before the new time.
    pub fn advance_us(&self, delta_us: u64) {
        self.0.now_us.set(self.0.now_us.get() + delta_us);
        self.pump();
    }

    fn pump(&self) {
        loop {
            let due = self.take_earliest_due_timer();
            match due {
                Some(f) => {
                    f();
                    self.drain();
                }
                None => break,
            }
        }
        self.drain();
    }

    fn take_earliest_due_timer(&self) -> Option<DeferredFn> {
        let now = self.0.now_us.get();
        let mut timers = self.0.timers.borrow_mut();
        let idx = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.expiry_us <= now)
            .min_by_key(|(_, t)| (t.expiry_us, t.seq))
            .map(|(idx, _)| idx)?;
        Some(timers.remove(idx).f)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for Harness {
    fn now_us(&self) -> u64 {
        self.0.now_us.get()
    }
}

impl Scheduler for Harness {
    fn defer(&self, f: DeferredFn) {
        self.0.deferred.borrow_mut().push_back(f);
    }

    fn arm_timer_us(&self, delay_us: u64, f: DeferredFn) {
        let seq = self.0.next_seq.get();
        self.0.next_seq.set(seq + 1);
        self.0.timers.borrow_mut().push(Timer {
            expiry_us: self.0.now_us.get() + delay_us,
            seq,
            f,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn deferred_runs_fifo_even_when_reentrant() {
        let h = Harness::new();
        let log = Rc::new(StdRefCell::new(Vec::new()));

        let log2 = log.clone();
        let h2 = h.clone();
        h.defer(Box::new(move || {
            log2.borrow_mut().push(1);
            // Schedule more work from inside a running callback.
            let log3 = log2.clone();
            h2.defer(Box::new(move || log3.borrow_mut().push(3)));
        }));
        let log4 = log.clone();
        h.defer(Box::new(move || log4.borrow_mut().push(2)));

        h.drain();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn timer_fires_only_after_delay_elapses() {
        let h = Harness::new();
        let fired = Rc::new(Cell::new(false));
        let fired2 = fired.clone();
        h.arm_timer_us(10, Box::new(move || fired2.set(true)));

        h.advance_us(5);
        assert!(!fired.get());

        h.advance_us(5);
        assert!(fired.get());
    }
}
