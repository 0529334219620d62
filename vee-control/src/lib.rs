// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wires the leaf components into one machine and exposes the
//! control-channel command surface (`vee-ssd1306-get-pixel`,
//! `vee-vm-feed`, `vee-get-vm-time-us`) as plain functions over it.
//!
//! Host concerns this crate does not own: the control-channel transport
//! itself (request framing, event delivery) and virtual-machine lifecycle
//! control (actually pausing/resuming the guest CPU). Those stay behind
//! the `on_resume`/`on_tick`/`on_pause` callbacks in [`control::vm_feed`]
//! so this crate never reaches for a concrete VM handle.

mod control;
mod machine;

pub use control::{get_vm_time_us, ssd1306_get_pixel, vm_feed, PixelSnapshot, VM_FEED_TICK_US};
pub use machine::{MachineSnapshot, VeeMachine};
