// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Electrical endpoints (`Pin`) and the wires that join them (`Line`).
//!
//! Every other crate in this workspace builds on top of these two types:
//! GPIO banks and SSD1306 own pins directly; the SPI master owns no pins
//! of its own and instead drives/samples AFIO cells bound to whichever
//! GPIO pins are configured for its alternate function. A `Line` holds
//! non-owning references to pins owned elsewhere to perform wired-AND
//! arbitration across them.

pub mod line;
pub mod pin;
pub mod supply;

pub use line::Line;
pub use pin::{Direction, Pin, PinHandler};
pub use supply::{new_supply_pin, parse_pin_voltage_mv, DEFAULT_SUPPLY_MV};
