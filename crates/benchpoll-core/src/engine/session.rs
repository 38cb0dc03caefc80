//! Poll session driver
//!
//! Runs the [`PollMachine`] against a real transport: feeds it events,
//! carries out the effects it returns, and owns the transport, the series and
//! the sink for the lifetime of the session.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Diagnostics, Effect, Event, PollMachine, Reply, SessionState};
use crate::config::{ConfigError, SessionConfig};
use crate::protocol::{CodecError, Command, LineCodec, TransportError};
use crate::series::MeasurementSeries;
use crate::sink::Sink;
use crate::transport::{SerialTransport, Transport};

/// Final outcome of a session
#[derive(Debug)]
pub struct SessionReport {
    /// Terminal state (`Stopped` or `Faulted`)
    pub state: SessionState,
    /// Every measurement accepted during the session
    pub series: MeasurementSeries,
    /// Recoverable events seen during the session
    pub diagnostics: Diagnostics,
}

impl SessionReport {
    /// Check if the session ended by cancellation rather than a fault
    pub fn stopped_cleanly(&self) -> bool {
        self.state == SessionState::Stopped
    }
}

/// A single polling session with one instrument
pub struct Session {
    config: SessionConfig,
    machine: PollMachine,
    state: SessionState,
    /// Present from a successful open until release
    codec: Option<LineCodec>,
    series: MeasurementSeries,
    sink: Box<dyn Sink>,
    diagnostics: Diagnostics,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session. The config is validated here, before any port is opened.
    pub fn new(config: SessionConfig, sink: impl Sink + 'static) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            machine: PollMachine::new(config.ready_sentinel, config.sink_faults),
            config,
            state: SessionState::Disconnected,
            codec: None,
            series: MeasurementSeries::new(),
            sink: Box::new(sink),
            diagnostics: Diagnostics::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops this session when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the configured serial port and poll until stopped or faulted
    pub async fn run_serial(self) -> SessionReport {
        let opened = SerialTransport::open(&self.config.instrument)
            .map(|port| Box::new(port) as Box<dyn Transport>);
        self.drive(opened).await
    }

    /// Poll over an already opened transport until stopped or faulted
    pub async fn run(self, transport: Box<dyn Transport>) -> SessionReport {
        self.drive(Ok(transport)).await
    }

    async fn drive(mut self, opened: Result<Box<dyn Transport>, TransportError>) -> SessionReport {
        let first = match opened {
            Ok(transport) => {
                self.codec = Some(LineCodec::new(transport));
                info!(port = %self.config.instrument.port, "session started");
                Event::Opened
            }
            Err(e) => {
                error!(error = %e, "could not open transport");
                Event::OpenFailed(e.to_string())
            }
        };

        let mut pending = self.apply(first);

        while !self.state.is_terminal() {
            let next = pending.pop_front();

            // Bookkeeping effects always finish; anything that talks to the
            // instrument or waits is skipped once cancellation is requested.
            let touches_instrument = !matches!(
                next,
                Some(Effect::Record(_) | Effect::Diagnose(_) | Effect::Release)
            );
            if touches_instrument && self.cancel.is_cancelled() {
                pending = self.apply(Event::Cancel);
                continue;
            }

            let event = match next {
                Some(effect) => self.execute(effect).await,
                None => {
                    // Top of a poll cycle
                    self.diagnostics.cycles += 1;
                    Some(Event::Tick)
                }
            };
            if let Some(event) = event {
                pending = self.apply(event);
            }
        }

        // Terminal transitions only carry the release
        for effect in pending {
            self.execute(effect).await;
        }
        // Nothing may keep the port open past the end of the session
        self.release().await;

        match &self.state {
            SessionState::Faulted(reason) => error!(%reason, "session faulted"),
            _ => info!(
                measurements = self.series.len(),
                errors = self.diagnostics.error_count(),
                "session stopped"
            ),
        }

        SessionReport {
            state: self.state,
            series: self.series,
            diagnostics: self.diagnostics,
        }
    }

    fn apply(&mut self, event: Event) -> VecDeque<Effect> {
        let transition = self.machine.step(&self.state, event);
        if transition.state != self.state {
            debug!(from = ?self.state, to = ?transition.state, "state change");
        }
        self.state = transition.state;
        transition.effects.into()
    }

    /// Carry out one effect. Returns the event it produced, if any.
    async fn execute(&mut self, effect: Effect) -> Option<Event> {
        let timing = self.config.timing;

        match effect {
            Effect::Send(command) => {
                if let Err(e) = self.send(command).await {
                    return Some(self.transport_failed(e));
                }
                sleep_or_cancel(&self.cancel, timing.pace()).await
            }
            Effect::Query(command) => {
                if let Err(e) = self.send(command).await {
                    return Some(self.transport_failed(e));
                }
                if let Some(cancel) = sleep_or_cancel(&self.cancel, timing.settle()).await {
                    return Some(cancel);
                }

                let reply = match self.receive().await {
                    Ok(Some(line)) => Reply::Line(line),
                    Ok(None) => {
                        if self.state == SessionState::AwaitingStatus {
                            self.diagnostics.empty_status += 1;
                        }
                        Reply::Empty
                    }
                    Err(CodecError::Decode { byte, offset }) => {
                        Reply::Undecodable(format!("byte 0x{byte:02x} at offset {offset}"))
                    }
                    Err(CodecError::Transport(e)) => return Some(self.transport_failed(e)),
                };
                Some(Event::Reply(reply))
            }
            Effect::Record(value) => self.record(value),
            Effect::Diagnose(diagnostic) => {
                warn!(%diagnostic, "recoverable protocol error");
                self.diagnostics.record(&diagnostic);
                None
            }
            Effect::Pace => sleep_or_cancel(&self.cancel, timing.pace()).await,
            Effect::Release => {
                self.release().await;
                None
            }
        }
    }

    /// Append a value and hand it to the sink, isolating sink failures
    fn record(&mut self, value: f64) -> Option<Event> {
        let measurement = self.series.append(value);
        info!(index = measurement.index, value, "measurement accepted");

        let sink = &mut self.sink;
        let series = &self.series;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.accept(&measurement, series)));

        match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(Event::SinkFailed(e.to_string())),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "sink panicked".to_string());
                Some(Event::SinkFailed(reason))
            }
        }
    }

    async fn send(&mut self, command: Command) -> Result<(), TransportError> {
        let codec = self.codec.as_mut().ok_or(TransportError::Closed)?;
        codec.send(command).await
    }

    async fn receive(&mut self) -> Result<Option<String>, CodecError> {
        let timeout = self.config.instrument.read_timeout();
        let codec = self.codec.as_mut().ok_or(TransportError::Closed)?;
        codec.receive(timeout).await
    }

    fn transport_failed(&self, e: TransportError) -> Event {
        error!(error = %e, state = ?self.state, "transport failure");
        Event::TransportFailed(e.to_string())
    }

    /// Close the transport. Runs at most once per session.
    async fn release(&mut self) {
        if let Some(mut codec) = self.codec.take() {
            let (tx_bytes, rx_bytes, tx_lines, rx_lines) = codec.counters();
            if let Err(e) = codec.close().await {
                warn!(error = %e, "error while releasing transport");
            }
            info!(tx_bytes, rx_bytes, tx_lines, rx_lines, "transport released");
        }
    }
}

/// Wait `duration`, or less if cancellation arrives first
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Option<Event> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Some(Event::Cancel),
        _ = tokio::time::sleep(duration) => None,
    }
}
