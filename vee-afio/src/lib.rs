// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One logical channel of an on-chip peripheral (e.g. SPI1.MOSI), and the
//! process-wide, statically-shaped table of such channels.
//!
//! The table's *shape* -- which cells exist for which peripheral instance
//! -- is fixed at compile time, matching the populated subset of the
//! reference manual's alternate-function map this core claims to model
//! (SPI1's CS/SCK/MISO/MOSI and I2C1's SCL/SDA). A cell's *binding* to a
//! particular (GPIO bank, pin) is mutable and is rewritten whenever the
//! guest reprograms AFRL/AFRH.

mod cell;
mod table;

pub use cell::{AfioCell, AfioNotifier};
pub use table::{AfioTable, I2c1Cells, Port, Spi1Cells};

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out a fresh identity for a newly constructed GPIO bank.
///
/// AFIO cells store the identity of their currently bound bank, not a
/// reference to it, so that a stale binding left behind by a rebind can be
/// recognized and ignored (see [`AfioCell::is_bound_to`]) without the
/// bank-to-cell dependency this crate would otherwise need.
pub fn next_bank_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
