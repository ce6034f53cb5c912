//! Viewport dimensions for browser capture.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Ceiling on either side. Captures beyond this are almost certainly a
/// typo and would balloon screenshot buffers.
const MAX_DIMENSION: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid viewport '{input}': {reason}")]
pub struct ViewportParseError {
    input: String,
    reason: String,
}

impl ViewportParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

fn parse_side(input: &str, raw: &str, name: &str) -> Result<u32, ViewportParseError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ViewportParseError::new(input, format!("{name} is not a whole number")))?;
    if value == 0 {
        return Err(ViewportParseError::new(
            input,
            format!("{name} must be positive"),
        ));
    }
    if value > MAX_DIMENSION {
        return Err(ViewportParseError::new(
            input,
            format!("{name} exceeds the {MAX_DIMENSION}px limit"),
        ));
    }
    Ok(value)
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(|| {
            ViewportParseError::new(s, "expected WIDTHxHEIGHT, e.g. 1440x900")
        })?;
        Ok(Viewport {
            width: parse_side(s, w, "width")?,
            height: parse_side(s, h, "height")?,
        })
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
