//! Protocol errors

use thiserror::Error;

/// Errors raised by the byte transport underneath the line codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to open port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Transport is closed")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Errors that can occur while receiving a response line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Non-ASCII byte 0x{byte:02x} at offset {offset}")]
    Decode { byte: u8, offset: usize },
}

/// Errors that can occur while interpreting a response line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed reply {line:?}: {reason}")]
    Malformed { line: String, reason: String },
}

impl ParseError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}
