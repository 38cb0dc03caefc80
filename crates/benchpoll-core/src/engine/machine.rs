//! Poll state machine
//!
//! Pure transition function of the polling protocol. Given the current
//! state and an event it returns the next state and the effects the driver
//! must carry out, in order. It performs no I/O and keeps no clock, so every
//! timing- and fault-related decision can be tested without a serial line.

use serde::Serialize;
use std::fmt;

use super::Diagnostic;
use crate::config::SinkFaultPolicy;
use crate::protocol::{parse_fetch, parse_status, Command, READY_SENTINEL};

/// Why a session ended as faulted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FaultReason {
    /// The transport could not be opened; no command was sent
    Open(String),
    /// A write or read failed after the transport was opened
    Transport(String),
    /// The sink failed and the policy is to abort
    Sink(String),
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::Open(reason) => write!(f, "transport open failed: {reason}"),
            FaultReason::Transport(reason) => write!(f, "transport failed: {reason}"),
            FaultReason::Sink(reason) => write!(f, "sink failed: {reason}"),
        }
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Transport not opened yet
    Disconnected,
    /// Sending the initialization commands
    Initializing,
    /// Polling the status register
    AwaitingStatus,
    /// Status reported ready; fetching the reading
    Ready,
    /// Ended by a fatal fault
    Faulted(FaultReason),
    /// Ended by cancellation
    Stopped,
}

impl SessionState {
    /// Check if the session has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Faulted(_) | SessionState::Stopped)
    }
}

/// Outcome of a read after a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A trimmed ASCII line
    Line(String),
    /// Nothing was received within the read window
    Empty,
    /// Bytes arrived but were not ASCII
    Undecodable(String),
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Transport opened
    Opened,
    /// Transport could not be opened
    OpenFailed(String),
    /// Start of a poll cycle (no effects pending, no cancellation)
    Tick,
    /// Cancellation requested
    Cancel,
    /// Result of the last `Query` effect
    Reply(Reply),
    /// A write or read failed
    TransportFailed(String),
    /// The sink failed on the last recorded measurement
    SinkFailed(String),
}

/// Work the driver performs on behalf of the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write a command, then wait the pace delay
    Send(Command),
    /// Write a query, wait the settle delay, read the reply and feed it back
    Query(Command),
    /// Append the value to the series and notify the sink
    Record(f64),
    /// Count and report a recoverable event
    Diagnose(Diagnostic),
    /// Wait the pace delay
    Pace,
    /// Release the transport
    Release,
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State after the event
    pub state: SessionState,
    /// Effects to carry out, in order
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: SessionState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

/// The polling protocol's transition function and its fixed parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollMachine {
    ready_sentinel: u32,
    sink_faults: SinkFaultPolicy,
}

impl Default for PollMachine {
    fn default() -> Self {
        Self::new(READY_SENTINEL, SinkFaultPolicy::default())
    }
}

impl PollMachine {
    /// Create a machine with the given ready sentinel and sink policy
    pub fn new(ready_sentinel: u32, sink_faults: SinkFaultPolicy) -> Self {
        Self {
            ready_sentinel,
            sink_faults,
        }
    }

    /// Compute the next state and effects for `event` in `state`
    pub fn step(&self, state: &SessionState, event: Event) -> Transition {
        use SessionState::*;

        if state.is_terminal() {
            return Transition::to(state.clone(), Vec::new());
        }

        match (state, event) {
            (Disconnected, Event::Cancel) => Transition::to(Stopped, Vec::new()),
            (_, Event::Cancel) => Transition::to(Stopped, vec![Effect::Release]),

            (Disconnected, Event::OpenFailed(reason)) => {
                Transition::to(Faulted(FaultReason::Open(reason)), Vec::new())
            }
            (Disconnected, Event::Opened) => Transition::to(
                Initializing,
                Command::INIT_SEQUENCE.into_iter().map(Effect::Send).collect(),
            ),

            (_, Event::TransportFailed(reason)) => Transition::to(
                Faulted(FaultReason::Transport(reason)),
                vec![Effect::Release],
            ),

            // Init sequence done, or a new cycle. A stray tick in Ready drops
            // the pending fetch; the next status poll decides again.
            (Initializing | AwaitingStatus | Ready, Event::Tick) => Transition::to(
                AwaitingStatus,
                vec![Effect::Query(Command::QueryOperationStatus)],
            ),

            (AwaitingStatus, Event::Reply(reply)) => self.on_status(reply),
            (Ready, Event::Reply(reply)) => self.on_fetch(reply),

            (_, Event::SinkFailed(reason)) => match self.sink_faults {
                SinkFaultPolicy::Isolate => Transition::to(
                    state.clone(),
                    vec![
                        Effect::Diagnose(Diagnostic::SinkFailure(reason)),
                        Effect::Pace,
                    ],
                ),
                SinkFaultPolicy::Abort => {
                    Transition::to(Faulted(FaultReason::Sink(reason)), vec![Effect::Release])
                }
            },

            // Events that cannot happen in this state change nothing
            (state, _) => Transition::to(state.clone(), Vec::new()),
        }
    }

    fn on_status(&self, reply: Reply) -> Transition {
        use SessionState::*;

        match reply {
            Reply::Empty => Transition::to(AwaitingStatus, vec![Effect::Pace]),
            Reply::Undecodable(detail) => Transition::to(
                AwaitingStatus,
                vec![
                    Effect::Diagnose(Diagnostic::Undecodable {
                        command: Command::QueryOperationStatus,
                        detail,
                    }),
                    Effect::Pace,
                ],
            ),
            Reply::Line(line) => match parse_status(&line) {
                Ok(bits) if bits.is_ready(self.ready_sentinel) => {
                    Transition::to(Ready, vec![Effect::Query(Command::Fetch)])
                }
                Ok(_) => Transition::to(AwaitingStatus, vec![Effect::Pace]),
                Err(e) => Transition::to(
                    AwaitingStatus,
                    vec![
                        Effect::Diagnose(Diagnostic::MalformedStatus(e)),
                        Effect::Pace,
                    ],
                ),
            },
        }
    }

    fn on_fetch(&self, reply: Reply) -> Transition {
        use SessionState::*;

        let effects = match reply {
            Reply::Empty => vec![Effect::Diagnose(Diagnostic::EmptyFetch), Effect::Pace],
            Reply::Undecodable(detail) => vec![
                Effect::Diagnose(Diagnostic::Undecodable {
                    command: Command::Fetch,
                    detail,
                }),
                Effect::Pace,
            ],
            Reply::Line(line) => match parse_fetch(&line) {
                Ok(value) => vec![Effect::Record(value), Effect::Pace],
                Err(e) => vec![Effect::Diagnose(Diagnostic::MalformedFetch(e)), Effect::Pace],
            },
        };
        Transition::to(AwaitingStatus, effects)
    }
}
