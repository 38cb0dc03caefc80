//! Recoverable events seen during a session

use serde::Serialize;
use std::fmt;

use crate::protocol::{Command, ParseError};

/// A recoverable protocol event. Reported and counted, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Reply to `command` contained non-ASCII bytes
    Undecodable { command: Command, detail: String },
    /// Status reply could not be parsed
    MalformedStatus(ParseError),
    /// Fetch reply could not be parsed
    MalformedFetch(ParseError),
    /// Status said ready but the fetch returned nothing
    EmptyFetch,
    /// Sink rejected or panicked on a measurement
    SinkFailure(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Undecodable { command, detail } => {
                write!(f, "undecodable reply to {command}: {detail}")
            }
            Diagnostic::MalformedStatus(e) => write!(f, "status: {e}"),
            Diagnostic::MalformedFetch(e) => write!(f, "fetch: {e}"),
            Diagnostic::EmptyFetch => f.write_str("fetch returned no reply"),
            Diagnostic::SinkFailure(reason) => write!(f, "sink failed: {reason}"),
        }
    }
}

/// Counters for everything that did not produce a measurement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Poll cycles started
    pub cycles: u64,
    /// Status queries that got no reply
    pub empty_status: u64,
    /// Replies rejected by the line codec
    pub decode_errors: u64,
    /// Status replies that failed to parse
    pub status_parse_errors: u64,
    /// Fetch replies that failed to parse
    pub fetch_parse_errors: u64,
    /// Fetches that got no reply
    pub empty_fetches: u64,
    /// Measurements the sink failed to accept
    pub sink_failures: u64,
    /// Most recent diagnostic message
    pub last: Option<String>,
}

impl Diagnostics {
    /// Count a diagnostic and remember its message
    pub fn record(&mut self, diagnostic: &Diagnostic) {
        let counter = match diagnostic {
            Diagnostic::Undecodable { .. } => &mut self.decode_errors,
            Diagnostic::MalformedStatus(_) => &mut self.status_parse_errors,
            Diagnostic::MalformedFetch(_) => &mut self.fetch_parse_errors,
            Diagnostic::EmptyFetch => &mut self.empty_fetches,
            Diagnostic::SinkFailure(_) => &mut self.sink_failures,
        };
        *counter = counter.saturating_add(1);
        self.last = Some(diagnostic.to_string());
    }

    /// Total recoverable errors (empty status replies are not errors)
    pub fn error_count(&self) -> u64 {
        self.decode_errors
            + self.status_parse_errors
            + self.fetch_parse_errors
            + self.empty_fetches
            + self.sink_failures
    }
}
