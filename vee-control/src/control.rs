// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::rc::Rc;

use vee_ssd1306::Ssd1306;
use vee_sys::{Clock, Scheduler};

/// Tick cadence for `vm_feed`, matching `vee-vm-feed-tick-event`'s 5 ms
/// period.
pub const VM_FEED_TICK_US: u64 = 5_000;

/// Response shape for `vee-ssd1306-get-pixel`. `pixel` is in column-major
/// order (width outer, height inner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSnapshot {
    pub width: u32,
    pub height: u32,
    pub pixel: Vec<u32>,
}

/// `vee-ssd1306-get-pixel(path) -> { width, height, pixel }`. The `path`
/// lookup that resolves a control-channel request to a concrete `Ssd1306`
/// is the host's device-registration job; here the display is already in
/// hand.
pub fn ssd1306_get_pixel(display: &Ssd1306) -> PixelSnapshot {
    let (width, height, pixel) = display.export_pixels();
    PixelSnapshot { width, height, pixel }
}

/// `vee-get-vm-time-us() -> { time }`.
pub fn get_vm_time_us(clock: &Rc<dyn Clock>) -> u64 {
    clock.now_us()
}

/// `vee-vm-feed(count)`: resumes the VM, schedules `count` 5 ms ticks
/// (each invoking `on_tick` with the virtual time at that instant, the
/// moral equivalent of `vee-vm-feed-tick-event`), then pauses again.
/// Actually resuming/pausing the guest CPU is the host's job, so this
/// takes it as two callbacks rather than calling into a VM handle
/// directly.
pub fn vm_feed(
    scheduler: &Rc<dyn Scheduler>,
    clock: &Rc<dyn Clock>,
    count: u32,
    on_resume: impl FnOnce(),
    on_tick: Rc<dyn Fn(u64)>,
    on_pause: Rc<dyn Fn()>,
) {
    on_resume();
    schedule_tick(scheduler.clone(), clock.clone(), count, on_tick, on_pause);
}

fn schedule_tick(scheduler: Rc<dyn Scheduler>, clock: Rc<dyn Clock>, remaining: u32, on_tick: Rc<dyn Fn(u64)>, on_pause: Rc<dyn Fn()>) {
    if remaining == 0 {
        on_pause();
        return;
    }
    let sched_next = scheduler.clone();
    let clock_next = clock.clone();
    scheduler.arm_timer_us(
        VM_FEED_TICK_US,
        Box::new(move || {
            on_tick(clock_next.now_us());
            schedule_tick(sched_next, clock_next.clone(), remaining - 1, on_tick.clone(), on_pause.clone());
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use vee_sys::testing::Harness;

    #[test]
    fn vm_feed_ticks_count_times_then_pauses() {
        let h = Harness::new();
        let scheduler: Rc<dyn Scheduler> = Rc::new(h.clone());
        let clock: Rc<dyn Clock> = Rc::new(h.clone());

        let resumed = Rc::new(RefCell::new(false));
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let paused = Rc::new(RefCell::new(false));

        let resumed2 = resumed.clone();
        let ticks2 = ticks.clone();
        let paused2 = paused.clone();

        vm_feed(
            &scheduler,
            &clock,
            3,
            || *resumed2.borrow_mut() = true,
            Rc::new(move |t| ticks2.borrow_mut().push(t)),
            Rc::new(move || *paused2.borrow_mut() = true),
        );

        assert!(*resumed.borrow());
        assert!(!*paused.borrow());

        h.advance_us(VM_FEED_TICK_US * 3);

        assert_eq!(*ticks.borrow(), vec![VM_FEED_TICK_US, VM_FEED_TICK_US * 2, VM_FEED_TICK_US * 3]);
        assert!(*paused.borrow());
    }

    #[test]
    fn get_vm_time_us_reflects_the_clock() {
        let h = Harness::new();
        let clock: Rc<dyn Clock> = Rc::new(h.clone());
        h.advance_us(42);
        assert_eq!(get_vm_time_us(&clock), 42);
    }
}
