//! Byte transports
//!
//! The poll engine talks to the instrument through the [`Transport`]
//! capability. [`SerialTransport`] drives a real serial line;
//! [`SimulatedInstrument`] answers in-process for demos and tests.

mod serial;
mod simulated;

pub use serial::SerialTransport;
pub use simulated::SimulatedInstrument;

use async_trait::async_trait;
use std::time::Duration;

use crate::protocol::TransportError;

/// Abstraction for the byte channel to the instrument
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes to the instrument
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read whatever bytes are currently available, waiting at most `timeout`.
    ///
    /// Returns an empty buffer when the instrument has not answered.
    async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Release the underlying channel. Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the channel is still open
    fn is_open(&self) -> bool;
}
