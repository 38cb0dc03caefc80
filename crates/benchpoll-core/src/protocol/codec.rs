//! Line codec
//!
//! Frames outgoing commands with CR LF and turns whatever bytes the
//! instrument has sent into a single trimmed ASCII line.

use std::time::Duration;
use tracing::debug;

use super::{CodecError, Command, TransportError};
use crate::transport::Transport;

/// Decode a raw reply into a trimmed ASCII line.
///
/// Returns `Ok(None)` when the buffer holds nothing but whitespace.
pub fn decode_line(bytes: &[u8]) -> Result<Option<String>, CodecError> {
    if let Some(offset) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(CodecError::Decode {
            byte: bytes[offset],
            offset,
        });
    }

    // Every byte is ASCII, so this cannot fail
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Command/response framing on top of a [`Transport`]
pub struct LineCodec {
    transport: Box<dyn Transport>,
    /// Metrics: cumulative bytes/lines sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_lines: u64,
    rx_lines: u64,
}

impl LineCodec {
    /// Wrap a transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_lines: 0,
            rx_lines: 0,
        }
    }

    /// Get cumulative tx/rx bytes and line counters
    pub fn counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_lines, self.rx_lines)
    }

    /// Send a command followed by the line terminator
    pub async fn send(&mut self, command: Command) -> Result<(), TransportError> {
        let bytes = command.to_bytes();
        debug!(command = %command, "send");

        self.transport.write(&bytes).await?;
        self.tx_bytes = self.tx_bytes.saturating_add(bytes.len() as u64);
        self.tx_lines = self.tx_lines.saturating_add(1);
        Ok(())
    }

    /// Read whatever the instrument has sent within `timeout`.
    ///
    /// `Ok(None)` means the instrument has not answered (yet); it is not an error.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Option<String>, CodecError> {
        let bytes = self.transport.read_available(timeout).await?;
        self.rx_bytes = self.rx_bytes.saturating_add(bytes.len() as u64);

        let line = decode_line(&bytes)?;
        match &line {
            Some(text) => {
                self.rx_lines = self.rx_lines.saturating_add(1);
                debug!(reply = %text, "receive");
            }
            None => debug!(bytes = bytes.len(), "receive: nothing available"),
        }
        Ok(line)
    }

    /// Release the transport. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.transport.close().await
    }

    /// Check if the transport is still open
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedInstrument;

    #[test]
    fn test_decode_trims_whitespace() {
        assert_eq!(
            decode_line(b"  STAT 0\r\n").unwrap(),
            Some("STAT 0".to_string())
        );
        assert_eq!(decode_line(b"23.5 C\r\n").unwrap(), Some("23.5 C".to_string()));
    }

    #[test]
    fn test_decode_empty_is_none() {
        assert_eq!(decode_line(b"").unwrap(), None);
        assert_eq!(decode_line(b"\r\n").unwrap(), None);
        assert_eq!(decode_line(b" \t ").unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_non_ascii() {
        assert_eq!(
            decode_line(b"23.5 \xb0C"),
            Err(CodecError::Decode {
                byte: 0xb0,
                offset: 5
            })
        );
    }

    #[tokio::test]
    async fn test_send_and_receive_counters() {
        let mut codec = LineCodec::new(Box::new(SimulatedInstrument::with_seed(11)));

        codec.send(Command::QueryOperationStatus).await.unwrap();
        let line = codec.receive(Duration::from_millis(10)).await.unwrap();
        assert_eq!(line.as_deref(), Some("STAT 16"));

        // Nothing further was sent
        assert_eq!(codec.receive(Duration::from_millis(10)).await.unwrap(), None);

        let (tx_bytes, rx_bytes, tx_lines, rx_lines) = codec.counters();
        assert_eq!(tx_bytes, b"STAT:OPER?\r\n".len() as u64);
        assert_eq!(rx_bytes, b"STAT 16\r\n".len() as u64);
        assert_eq!(tx_lines, 1);
        assert_eq!(rx_lines, 1);
    }

    #[tokio::test]
    async fn test_closed_transport_surfaces_error() {
        let mut codec = LineCodec::new(Box::new(SimulatedInstrument::with_seed(12)));
        codec.close().await.unwrap();
        codec.close().await.unwrap();
        assert!(!codec.is_open());
        assert_eq!(codec.send(Command::Fetch).await, Err(TransportError::Closed));
        assert_eq!(
            codec.receive(Duration::ZERO).await,
            Err(CodecError::Transport(TransportError::Closed))
        );
    }
}
