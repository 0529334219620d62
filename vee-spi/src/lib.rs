// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memory-mapped SPI master: the bit-shift state machine driving
//! AFIO.SCK/MOSI and sampling AFIO.MISO, plus the SR/DR handshake seen by
//! the guest.

mod master;
mod reg;

pub use master::SpiMaster;
pub use reg::{SpiReg, SpiRegisters};
