//! # benchpoll Core Library
//!
//! Polling engine for SCPI-style bench instruments on a serial line.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A CR LF line codec over a pluggable byte transport
//! - Parsers for the instrument's status and fetch replies
//! - A pure poll state machine and the async session that drives it
//! - An append-only measurement series and sinks that consume it
//!
//! ## Example
//!
//! ```rust,ignore
//! use benchpoll_core::prelude::*;
//!
//! let config = SessionConfig::new(InstrumentConfig::new("COM1"));
//! let session = Session::new(config, LogSink::with_unit("C"))?;
//! let stop = session.cancellation_token();
//!
//! // Poll until `stop.cancel()` is called elsewhere
//! let report = session.run_serial().await;
//! println!("{} readings, ended {:?}", report.series.len(), report.state);
//! ```

pub mod config;
pub mod engine;
pub mod protocol;
pub mod series;
pub mod sink;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{InstrumentConfig, PollTiming, SessionConfig, SinkFaultPolicy};
    pub use crate::engine::{Diagnostics, FaultReason, Session, SessionReport, SessionState};
    pub use crate::protocol::{Command, LineCodec};
    pub use crate::series::{Measurement, MeasurementSeries};
    pub use crate::sink::{ChannelSink, CollectingSink, LogSink, Sink, SinkError};
    pub use crate::transport::{SerialTransport, SimulatedInstrument, Transport};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
