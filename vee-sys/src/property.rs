// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small `FromStr`-style helpers for the core's device properties
//! (`port-index`, `vee-pin-voltage-mv`, ...). Property *registration* is the
//! host's job; this just turns the string a property bag would hand back
//! into the typed value a component's constructor wants.

use std::num::ParseIntError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("property {name:?} value {raw:?} is not a valid u32: {source}")]
    InvalidU32 {
        name: &'static str,
        raw: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parses a `u32`-valued property, treating an empty string as "not set"
/// and returning `default` for it.
pub fn parse_u32_property(name: &'static str, raw: &str, default: u32) -> Result<u32, PropertyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed.parse::<u32>().map_err(|source| PropertyError::InvalidU32 {
        name,
        raw: raw.to_string(),
        source,
    })
}
