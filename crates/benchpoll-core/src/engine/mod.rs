//! Poll Engine
//!
//! The polling protocol as an explicit state machine ([`PollMachine`]) plus
//! the async driver that runs it against a transport ([`Session`]).
//!
//! Once per cycle the session checks for cancellation, asks the instrument
//! for its operation status, and fetches a reading when the status equals
//! the ready sentinel. Delays between steps are part of the instrument's
//! timing contract and come from [`PollTiming`](crate::config::PollTiming).

mod diagnostics;
mod machine;
mod session;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use machine::{Effect, Event, FaultReason, PollMachine, Reply, SessionState, Transition};
pub use session::{Session, SessionReport};
