//! Scripted transport shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use benchpoll_core::config::{InstrumentConfig, PollTiming, SessionConfig};
use benchpoll_core::protocol::TransportError;
use benchpoll_core::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Scripted {
    /// ASCII text, sent with a CR LF terminator
    Text(String),
    /// Raw bytes, sent as is
    Bytes(Vec<u8>),
    /// Nothing arrives
    Silence,
    /// The read fails
    Fail,
}

pub fn text(s: &str) -> Scripted {
    Scripted::Text(s.to_string())
}

/// Something the host did to the transport, with its (tokio) timestamp
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Write(String),
    Read(usize),
    Close,
}

#[derive(Default)]
struct Inner {
    status: VecDeque<Scripted>,
    fetch: VecDeque<Scripted>,
    pending: Option<Scripted>,
    written: Vec<String>,
    timeline: Vec<(Instant, Op)>,
    fail_write_at: Option<usize>,
    closes: usize,
    closed: bool,
}

/// Transport that answers `STAT:OPER?` and `FETC?` from two scripts.
///
/// Once both scripts are used up the transport cancels its token, so a
/// session driven by it ends after the cycle in progress.
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
    stop_when_exhausted: Option<CancellationToken>,
}

/// Read side of a [`ScriptedTransport`] kept by the test
#[derive(Clone)]
pub struct ScriptHandle {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptHandle) {
        let inner = Arc::new(Mutex::new(Inner::default()));
        (
            Self {
                inner: inner.clone(),
                stop_when_exhausted: None,
            },
            ScriptHandle { inner },
        )
    }

    pub fn status(self, replies: impl IntoIterator<Item = Scripted>) -> Self {
        self.inner.lock().unwrap().status.extend(replies);
        self
    }

    pub fn fetch(self, replies: impl IntoIterator<Item = Scripted>) -> Self {
        self.inner.lock().unwrap().fetch.extend(replies);
        self
    }

    /// Fail the n-th write (0-based)
    pub fn fail_write_at(self, n: usize) -> Self {
        self.inner.lock().unwrap().fail_write_at = Some(n);
        self
    }

    pub fn stop_when_exhausted(mut self, token: CancellationToken) -> Self {
        self.stop_when_exhausted = Some(token);
        self
    }
}

impl ScriptHandle {
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().written.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    pub fn timeline(&self) -> Vec<(Instant, Op)> {
        self.inner.lock().unwrap().timeline.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        if inner.fail_write_at == Some(inner.written.len()) {
            return Err(TransportError::Io("injected write failure".to_string()));
        }

        let command = String::from_utf8_lossy(bytes).trim().to_string();
        let reply = match command.as_str() {
            "STAT:OPER?" => Some(inner.status.pop_front().unwrap_or(Scripted::Silence)),
            "FETC?" => Some(inner.fetch.pop_front().unwrap_or(Scripted::Silence)),
            _ => None,
        };
        inner.pending = reply;
        inner.timeline.push((Instant::now(), Op::Write(command.clone())));
        inner.written.push(command);
        Ok(())
    }

    async fn read_available(&mut self, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(TransportError::Closed);
        }

        let bytes = match inner.pending.take() {
            Some(Scripted::Text(s)) => format!("{s}\r\n").into_bytes(),
            Some(Scripted::Bytes(b)) => b,
            Some(Scripted::Silence) | None => Vec::new(),
            Some(Scripted::Fail) => {
                return Err(TransportError::Io("injected read failure".to_string()))
            }
        };
        inner.timeline.push((Instant::now(), Op::Read(bytes.len())));

        if inner.status.is_empty() && inner.fetch.is_empty() {
            if let Some(token) = &self.stop_when_exhausted {
                token.cancel();
            }
        }
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.closes += 1;
        inner.closed = true;
        inner.timeline.push((Instant::now(), Op::Close));
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.inner.lock().unwrap().closed
    }
}

/// Session config with the instrument's default timing
pub fn session_config() -> SessionConfig {
    let mut config = SessionConfig::new(InstrumentConfig::new("COM1"));
    config.timing = PollTiming::default();
    config
}

pub const INIT: [&str; 3] = ["ROUT:CLOS (@1)", "INIT:CONT ON", "*CLS"];
