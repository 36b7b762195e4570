// SPDX-License-Identifier: Apache-2.0
//! JSON scenario loading: the primary wire format.

use std::fs;
use std::path::Path;

use crate::error::ConfigResult;
use crate::raw::RawScenario;

/// Reads and parses a single JSON scenario file.
pub fn load(path: &Path) -> ConfigResult<RawScenario> {
    let text = fs::read_to_string(path)?;
    let raw: RawScenario = serde_json::from_str(&text)?;
    Ok(raw)
}
