//! SCPI Line Protocol
//!
//! Implements the text command/response protocol spoken by the instrument:
//! CR LF terminated ASCII commands, whitespace-separated ASCII replies.

pub mod codec;
pub mod commands;
mod error;
pub mod response;

pub use codec::{decode_line, LineCodec};
pub use commands::Command;
pub use error::{CodecError, ParseError, TransportError};
pub use response::{parse_fetch, parse_status, FetchReply, StatusBits, StatusReply};

/// Line terminator appended to every command and expected after every reply
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Default baud rate of the instrument's serial interface
pub const DEFAULT_BAUD_RATE: u32 = 2400;

/// Default read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Status value meaning "a completed measurement is ready to fetch"
pub const READY_SENTINEL: u32 = 0;
