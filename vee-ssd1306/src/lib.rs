// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SPI-attached SSD1306 display controller.
//!
//! Owns its five pins directly (CS, SCK, MOSI, DC, RST) rather than
//! attaching to a separate generic SPI-slave shift register: CS-edge
//! framing, MSB-first byte accumulation, command interpretation, and the
//! GDDRAM pixel buffer all live in one place here.

mod display;
mod reg;

pub use display::Ssd1306;
pub use reg::{MemoryAddressingMode, Ssd1306Registers};

pub const DISPLAY_WIDTH: usize = 128;
pub const DISPLAY_HEIGHT: usize = 64;
pub const PAGE_HEIGHT: usize = 8;
pub const PAGE_COUNT: usize = DISPLAY_HEIGHT / PAGE_HEIGHT;

/// 0x0000FFFF, the lit-pixel color the exporter fills in for a set GDDRAM
/// bit or an entire-display-on command.
pub const ON_COLOR: u32 = 0x0000_FFFF;
