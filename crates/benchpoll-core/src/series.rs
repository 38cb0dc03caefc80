//! Measurement series
//!
//! Append-only record of accepted readings, in arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single accepted reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Position in the series (0-based)
    pub index: u64,
    /// Reading in the instrument's native unit
    pub value: f64,
    /// When the reading was accepted
    pub received_at: DateTime<Utc>,
}

/// Ordered, append-only sequence of measurements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementSeries {
    entries: Vec<Measurement>,
}

impl MeasurementSeries {
    /// Create an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value with the next sequence index
    pub fn append(&mut self, value: f64) -> Measurement {
        let measurement = Measurement {
            index: self.entries.len() as u64,
            value,
            received_at: Utc::now(),
        };
        self.entries.push(measurement.clone());
        measurement
    }

    /// Number of measurements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no measurement has been accepted yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a measurement by index
    pub fn get(&self, index: u64) -> Option<&Measurement> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    /// Most recent measurement
    pub fn last(&self) -> Option<&Measurement> {
        self.entries.last()
    }

    /// All measurements, oldest first
    pub fn as_slice(&self) -> &[Measurement] {
        &self.entries
    }

    /// Iterate over measurements, oldest first
    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.entries.iter()
    }

    /// Just the values, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|m| m.value).collect()
    }

    /// Measurements from `index` onward, for readers catching up
    pub fn since(&self, index: u64) -> &[Measurement] {
        let start = usize::try_from(index)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        &self.entries[start..]
    }
}

impl<'a> IntoIterator for &'a MeasurementSeries {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
