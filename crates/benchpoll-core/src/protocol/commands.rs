//! Protocol commands
//!
//! Defines the SCPI commands the poll engine sends to the instrument.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::LINE_TERMINATOR;

/// Commands understood by the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Close relay channel 1 (`ROUT:CLOS (@1)`)
    RouteClose,

    /// Enable continuous triggering (`INIT:CONT ON`)
    InitContinuous,

    /// Clear the status registers (`*CLS`)
    ClearStatus,

    /// Query the operation status register (`STAT:OPER?`)
    QueryOperationStatus,

    /// Fetch the latest reading (`FETC?`)
    Fetch,
}

impl Command {
    /// Commands sent once, in order, before polling starts
    pub const INIT_SEQUENCE: [Command; 3] = [
        Command::RouteClose,
        Command::InitContinuous,
        Command::ClearStatus,
    ];

    /// Get the command text as sent on the wire (without terminator)
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::RouteClose => "ROUT:CLOS (@1)",
            Command::InitContinuous => "INIT:CONT ON",
            Command::ClearStatus => "*CLS",
            Command::QueryOperationStatus => "STAT:OPER?",
            Command::Fetch => "FETC?",
        }
    }

    /// Check if this command expects a response
    pub fn expects_response(&self) -> bool {
        self.as_str().ends_with('?')
    }

    /// Look up a command from its wire text, ignoring surrounding whitespace
    pub fn from_wire(text: &str) -> Option<Command> {
        let text = text.trim();
        [
            Command::RouteClose,
            Command::InitContinuous,
            Command::ClearStatus,
            Command::QueryOperationStatus,
            Command::Fetch,
        ]
        .into_iter()
        .find(|cmd| cmd.as_str().eq_ignore_ascii_case(text))
    }

    /// Convert command to bytes, appending CR LF for transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.as_str().as_bytes().to_vec();
        bytes.extend_from_slice(LINE_TERMINATOR);
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
