// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A bank of 16 GPIO pins backed by ten memory-mapped registers: register
//! decoding, per-pin arbitration, AFIO cell binding, and the lock-sequence
//! state machine.

mod bank;
mod reg;

pub use bank::{GpioBank, PIN_COUNT};
pub use reg::{GpioReg, GpioRegisters};
