// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// `memory_addressing_mode` is masked to 2 bits at command-interpretation
/// time (`arg & 0x3`), so the fourth encoding (3) is reachable from the
/// guest even though the datasheet only defines 0..2. Treated the same as
/// `Page`, matching how a real part's undefined-mode behavior is usually
/// described (falls back to the last fully-specified mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryAddressingMode {
    Horizontal,
    Vertical,
    Page,
}

impl MemoryAddressingMode {
    pub fn from_bits(bits: u8) -> MemoryAddressingMode {
        match bits & 0x3 {
            0 => MemoryAddressingMode::Horizontal,
            1 => MemoryAddressingMode::Vertical,
            _ => MemoryAddressingMode::Page,
        }
    }
}

/// The SSD1306's control registers, as programmed through the command
/// set. Persisted across snapshots; `cmd_buffer` and the GDDRAM pixels are
/// persisted separately by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ssd1306Registers {
    pub memory_addressing_mode: MemoryAddressingMode,
    pub lower_column_start: u8,
    pub higher_column_start: u8,
    pub page_start: u8,
    pub page_end: u8,
    pub page_select: u8,
    pub column_start: u8,
    pub column_end: u8,
    pub display_on: bool,
    pub display_gddram: bool,
    pub display_inverse: bool,
}

impl Default for Ssd1306Registers {
    fn default() -> Self {
        Ssd1306Registers {
            memory_addressing_mode: MemoryAddressingMode::Page,
            lower_column_start: 0,
            higher_column_start: 0,
            page_start: 0,
            page_end: 0,
            page_select: 0,
            column_start: 0,
            column_end: 0,
            display_on: false,
            display_gddram: true,
            display_inverse: false,
        }
    }
}
