//! Response parsing
//!
//! The instrument answers the two queries with differently shaped lines:
//! a status reply carries the register value in its *last* token
//! (`"STAT 0"`), a fetch reply carries the reading in its *first* token
//! (`"23.5 C"`). The two parse paths are kept separate on purpose.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ParseError;

/// Contents of the operation status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusBits(pub u32);

impl StatusBits {
    /// Raw register value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Whole-word comparison against the ready sentinel.
    ///
    /// This is not a per-bit test: `4` is not ready even if the sentinel's
    /// bits happen to be clear in it.
    pub fn is_ready(&self, sentinel: u32) -> bool {
        self.0 == sentinel
    }
}

impl fmt::Display for StatusBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

/// Parsed result of a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReply {
    /// Nothing was received within the read window
    Empty,
    /// Register value
    Value(StatusBits),
}

impl StatusReply {
    /// Interpret an optional received line as a status reply
    pub fn from_line(line: Option<&str>) -> Result<Self, ParseError> {
        match line {
            None => Ok(StatusReply::Empty),
            Some(line) => parse_status(line).map(StatusReply::Value),
        }
    }
}

/// Parsed result of a fetch query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchReply {
    /// Nothing was received within the read window
    Empty,
    /// Reading in the instrument's native unit
    Value(f64),
}

impl FetchReply {
    /// Interpret an optional received line as a fetch reply
    pub fn from_line(line: Option<&str>) -> Result<Self, ParseError> {
        match line {
            None => Ok(FetchReply::Empty),
            Some(line) => parse_fetch(line).map(FetchReply::Value),
        }
    }
}

/// Parse a status line: last whitespace-separated token as a decimal integer
pub fn parse_status(line: &str) -> Result<StatusBits, ParseError> {
    let token = line
        .split_whitespace()
        .last()
        .ok_or_else(|| ParseError::malformed(line, "no tokens"))?;

    token
        .parse::<u32>()
        .map(StatusBits)
        .map_err(|e| ParseError::malformed(line, format!("status token {token:?}: {e}")))
}

/// Parse a fetch line: first whitespace-separated token as a decimal number
pub fn parse_fetch(line: &str) -> Result<f64, ParseError> {
    let token = line
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::malformed(line, "no tokens"))?;

    let value = token
        .parse::<f64>()
        .map_err(|e| ParseError::malformed(line, format!("reading token {token:?}: {e}")))?;

    // "nan" and "inf" parse as f64 but are never readings
    if !value.is_finite() {
        return Err(ParseError::malformed(
            line,
            format!("reading token {token:?} is not finite"),
        ));
    }

    Ok(value)
}
