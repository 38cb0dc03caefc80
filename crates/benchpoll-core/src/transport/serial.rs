//! Serial port handling
//!
//! Provides serial port access for instrument communication.

use async_trait::async_trait;
use serialport::{FlowControl, SerialPort};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use super::Transport;
use crate::config::InstrumentConfig;
use crate::protocol::TransportError;

/// Serial line to the instrument
pub struct SerialTransport {
    /// Port handle, `None` once closed
    port: Option<SerialStream>,
    /// Port name, kept for diagnostics
    name: String,
}

impl SerialTransport {
    /// Open and configure the serial port described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &InstrumentConfig) -> Result<Self, TransportError> {
        let open_error = |reason: String| TransportError::Open {
            port: config.port.clone(),
            reason,
        };

        let data_bits = config
            .serial_data_bits()
            .map_err(|e| open_error(e.to_string()))?;

        let port = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout())
            .open_native_async()
            .map_err(|e| open_error(e.to_string()))?;

        // Drop anything the instrument sent before we were listening
        port.clear(serialport::ClearBuffer::All)
            .map_err(|e| open_error(e.to_string()))?;

        info!(
            port = %config.port,
            baud = config.baud_rate,
            "serial port opened"
        );

        Ok(Self {
            port: Some(port),
            name: config.port.clone(),
        })
    }

    /// Port name this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        port.write_all(bytes).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read_available(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;

        let available = port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; available];
        let mut received = 0;
        let deadline = Instant::now() + timeout;

        while received < buffer.len() {
            match tokio::time::timeout_at(deadline, port.read(&mut buffer[received..])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => received += n,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!(
                        port = %self.name,
                        received,
                        expected = available,
                        "read timed out before all buffered bytes arrived"
                    );
                    break;
                }
            }
        }

        buffer.truncate(received);
        Ok(buffer)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut port) = self.port.take() {
            port.shutdown().await?;
            info!(port = %self.name, "serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
