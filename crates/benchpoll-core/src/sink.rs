//! Measurement sinks
//!
//! A sink receives every accepted measurement, synchronously and in order.
//! The engine never depends on what the sink does with it.

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::series::{Measurement, MeasurementSeries};

/// Failure raised by a sink while accepting a measurement
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Sink error: {0}")]
pub struct SinkError(pub String);

/// Consumer of newly accepted measurements
pub trait Sink: Send {
    /// Accept the newest measurement. `series` is a read-only view that
    /// already contains it as its last entry.
    fn accept(
        &mut self,
        measurement: &Measurement,
        series: &MeasurementSeries,
    ) -> Result<(), SinkError>;
}

impl<F> Sink for F
where
    F: FnMut(&Measurement, &MeasurementSeries) -> Result<(), SinkError> + Send,
{
    fn accept(
        &mut self,
        measurement: &Measurement,
        series: &MeasurementSeries,
    ) -> Result<(), SinkError> {
        self(measurement, series)
    }
}

/// Sink that reports every measurement through `tracing`
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    /// Unit label appended to the logged value
    unit: Option<String>,
}

impl LogSink {
    /// Create a log sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log sink with a unit label
    pub fn with_unit(unit: impl Into<String>) -> Self {
        Self {
            unit: Some(unit.into()),
        }
    }
}

impl Sink for LogSink {
    fn accept(
        &mut self,
        measurement: &Measurement,
        series: &MeasurementSeries,
    ) -> Result<(), SinkError> {
        info!(
            index = measurement.index,
            value = measurement.value,
            unit = self.unit.as_deref().unwrap_or(""),
            total = series.len(),
            "measurement"
        );
        Ok(())
    }
}

/// Sink that forwards measurements to another task over a bounded channel.
///
/// Never blocks: a full or closed channel is reported as a sink error.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Measurement>,
}

impl ChannelSink {
    /// Create a channel sink and the receiver that drains it
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Measurement>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn accept(
        &mut self,
        measurement: &Measurement,
        _series: &MeasurementSeries,
    ) -> Result<(), SinkError> {
        self.tx
            .try_send(measurement.clone())
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Sink that keeps a shared copy of everything it receives
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    received: Arc<Mutex<Vec<Measurement>>>,
}

impl CollectingSink {
    /// Create an empty collecting sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the measurements received so far
    pub fn received(&self) -> Vec<Measurement> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of measurements received so far
    pub fn count(&self) -> usize {
        self.received.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl Sink for CollectingSink {
    fn accept(
        &mut self,
        measurement: &Measurement,
        _series: &MeasurementSeries,
    ) -> Result<(), SinkError> {
        self.received
            .lock()
            .map_err(|e| SinkError(e.to_string()))?
            .push(measurement.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        let mut series = MeasurementSeries::new();
        let m = series.append(4.0);
        {
            let mut sink = |m: &Measurement, s: &MeasurementSeries| {
                seen.push((m.index, s.len()));
                Ok::<(), SinkError>(())
            };
            sink.accept(&m, &series).unwrap();
        }
        assert_eq!(seen, vec![(0, 1)]);
    }

    #[test]
    fn test_collecting_sink_shares_state() {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();
        let mut series = MeasurementSeries::new();

        let m = series.append(1.5);
        writer.accept(&m, &series).unwrap();
        let m = series.append(2.5);
        writer.accept(&m, &series).unwrap();

        assert_eq!(sink.count(), 2);
        let values: Vec<f64> = sink.received().iter().map(|m| m.value).collect();
        assert_eq!(values, vec![1.5, 2.5]);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (mut sink, mut rx) = ChannelSink::new(4);
        let mut series = MeasurementSeries::new();
        for v in [1.0, 2.0, 3.0] {
            let m = series.append(v);
            sink.accept(&m, &series).unwrap();
        }
        for expected in 0..3u64 {
            assert_eq!(rx.recv().await.map(|m| m.index), Some(expected));
        }
    }

    #[test]
    fn test_channel_sink_full_is_error() {
        let (mut sink, _rx) = ChannelSink::new(1);
        let mut series = MeasurementSeries::new();
        let m = series.append(1.0);
        assert!(sink.accept(&m, &series).is_ok());
        let m = series.append(2.0);
        assert!(sink.accept(&m, &series).is_err());
    }

    #[test]
    fn test_channel_sink_closed_is_error() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);
        let mut series = MeasurementSeries::new();
        let m = series.append(1.0);
        assert!(sink.accept(&m, &series).is_err());
    }

    #[test]
    fn test_log_sink_accepts() {
        let mut sink = LogSink::with_unit("C");
        let mut series = MeasurementSeries::new();
        let m = series.append(23.5);
        assert!(sink.accept(&m, &series).is_ok());
    }
}
