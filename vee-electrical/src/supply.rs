// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The "generic pin supply" device: a pin permanently driving a fixed
//! voltage, for `Line`s that tie a real pin straight to a rail (VCC/GND)
//! rather than to another component's pin.

use std::rc::Rc;

use vee_sys::property::{parse_u32_property, PropertyError};
use vee_sys::Scheduler;

use crate::pin::{Direction, Pin};

/// Default for the `vee-pin-voltage-mv` property.
pub const DEFAULT_SUPPLY_MV: u32 = 3300;

/// Parses the `vee-pin-voltage-mv` property (default 3300).
pub fn parse_pin_voltage_mv(raw: &str) -> Result<u32, PropertyError> {
    parse_u32_property("vee-pin-voltage-mv", raw, DEFAULT_SUPPLY_MV)
}

/// Builds a pin that permanently drives `out_voltage_mv` and never reads
/// its own input side. Unlike the non-contending observer pattern used by
/// SSD1306's own pins (`Direction::In` at full voltage), a supply pin uses
/// `Direction::Out`: on a `Line`, it actively participates in the
/// wired-AND minimum rather than just declining to pull it down.
pub fn new_supply_pin(scheduler: Rc<dyn Scheduler>, out_voltage_mv: u32) -> Rc<Pin> {
    let pin = Pin::new(scheduler);
    pin.set_output(Direction::Out, out_voltage_mv, 0);
    pin
}
