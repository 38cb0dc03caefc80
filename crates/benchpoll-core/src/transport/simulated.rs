//! Simulated instrument
//!
//! An in-process stand-in for a temperature meter that speaks the same
//! command set as the real device. Useful for demos and for exercising the
//! poll engine without hardware.
//!
//! The simulated meter takes a configurable number of status polls to finish
//! a conversion. While converting, `STAT:OPER?` reports the measuring bit;
//! once done it reports `0` and the next `FETC?` returns a new reading.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::Transport;
use crate::protocol::{Command, TransportError, LINE_TERMINATOR};

/// Status register bit reported while a conversion is in progress
const MEASURING_BIT: u32 = 1 << 4;

/// Simulated SCPI temperature meter
pub struct SimulatedInstrument {
    /// Bytes written by the host that have not formed a full line yet
    input: Vec<u8>,
    /// Reply bytes waiting to be read by the host
    output: Vec<u8>,
    /// Channel relay closed (`ROUT:CLOS`)
    route_closed: bool,
    /// Continuous triggering enabled (`INIT:CONT ON`)
    continuous: bool,
    /// Status polls seen since the last completed conversion
    polls_since_reading: u32,
    /// Status polls a conversion takes
    conversion_polls: u32,
    /// Current temperature (random walk)
    temperature: f64,
    /// Probability that a reply is replaced by line noise
    glitch_probability: f64,
    /// Released by the host
    closed: bool,
    /// Random number generator
    rng: StdRng,
}

impl Default for SimulatedInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInstrument {
    /// Create a new simulated meter seeded from entropy
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a simulated meter with a fixed seed
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            input: Vec::new(),
            output: Vec::new(),
            route_closed: false,
            continuous: false,
            polls_since_reading: 0,
            conversion_polls: 2,
            temperature: 23.0,
            glitch_probability: 0.0,
            closed: false,
            rng,
        }
    }

    /// Set how many status polls a conversion takes (minimum 1)
    pub fn conversion_polls(mut self, polls: u32) -> Self {
        self.conversion_polls = polls.max(1);
        self
    }

    /// Replace a fraction of replies with noise
    pub fn glitch_probability(mut self, probability: f64) -> Self {
        self.glitch_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Check whether the host has configured the meter for measuring
    pub fn is_measuring(&self) -> bool {
        self.route_closed && self.continuous
    }

    fn conversion_done(&self) -> bool {
        self.is_measuring() && self.polls_since_reading >= self.conversion_polls
    }

    fn handle_line(&mut self, line: &str) {
        let Some(command) = Command::from_wire(line) else {
            // Real meters push -113 onto the error queue; nothing to answer
            return;
        };

        match command {
            Command::RouteClose => self.route_closed = true,
            Command::InitContinuous => self.continuous = true,
            Command::ClearStatus => self.polls_since_reading = 0,
            Command::QueryOperationStatus => {
                if self.is_measuring() {
                    self.polls_since_reading = self.polls_since_reading.saturating_add(1);
                }
                let status = if self.conversion_done() {
                    0
                } else {
                    MEASURING_BIT
                };
                self.reply(format!("STAT {status}"));
            }
            Command::Fetch => {
                if self.conversion_done() {
                    self.advance_temperature();
                    self.polls_since_reading = 0;
                }
                self.reply(format!("{:.3} C", self.temperature));
            }
        }
    }

    fn advance_temperature(&mut self) {
        let step: f64 = self.rng.gen_range(-0.05..0.05);
        // Pull gently back toward room temperature
        let drift = (23.0 - self.temperature) * 0.02;
        self.temperature += step + drift;
    }

    fn reply(&mut self, text: String) {
        if self.glitch_probability > 0.0 && self.rng.gen_bool(self.glitch_probability) {
            // Framing noise: high-bit bytes the codec must reject
            self.output.extend_from_slice(&[0xff, 0xfe, b'?']);
        } else {
            self.output.extend_from_slice(text.as_bytes());
        }
        self.output.extend_from_slice(LINE_TERMINATOR);
    }
}

#[async_trait]
impl Transport for SimulatedInstrument {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        self.input.extend_from_slice(bytes);
        while let Some(end) = self.input.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.input.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line).into_owned();
            self.handle_line(&text);
        }
        Ok(())
    }

    async fn read_available(&mut self, _timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(std::mem::take(&mut self.output))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}
