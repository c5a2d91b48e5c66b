//! Session-long min / max / mean of decibel observations.
//!
//! The mean is the plain arithmetic mean of the dB values, not an energetic
//! average. `-inf` dB (a silent block) is a valid observation: it pulls `min`
//! down but is left out of `max` and of the mean. NaN and `+inf` are rejected.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{IndicatorError, Result};

/// Summary of a run of level observations, in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SplStatistics {
    pub fn new(min: f64, max: f64, mean: f64) -> Self {
        Self { min, max, mean }
    }
}

/// Running state behind an [`SplStatistics`] snapshot.
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    /// Every accepted observation, silent ones included.
    count: u64,
    /// Observations that contribute to `sum`.
    finite_count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {
            count: 0,
            finite_count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Fold one level into the running state.
    ///
    /// # Errors
    /// `InvalidSample` for NaN or `+inf`; the state is left untouched.
    pub fn observe(&mut self, value: f64) -> Result<()> {
        validate(value)?;
        self.apply(value);
        Ok(())
    }

    /// Fold a whole level sequence. All-or-nothing: one bad value rejects the batch.
    pub fn observe_all(&mut self, values: &[f64]) -> Result<()> {
        for &value in values {
            validate(value)?;
        }
        for &value in values {
            self.apply(value);
        }
        Ok(())
    }

    /// Current `(min, max, mean)` without resetting.
    ///
    /// # Errors
    /// `InvalidConfiguration` when nothing has been observed since the last reset.
    pub fn snapshot(&self) -> Result<SplStatistics> {
        if self.count == 0 {
            return Err(IndicatorError::InvalidConfiguration(
                "no level observed in this session".into(),
            ));
        }
        let mean = if self.finite_count == 0 {
            f64::NEG_INFINITY
        } else {
            self.sum / self.finite_count as f64
        };
        Ok(SplStatistics::new(self.min, self.max, mean))
    }

    /// Start a new session.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn apply(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        if value.is_finite() {
            self.finite_count += 1;
            self.sum += value;
            self.max = self.max.max(value);
        }
    }
}

fn validate(value: f64) -> Result<()> {
    if value.is_nan() || value == f64::INFINITY {
        return Err(IndicatorError::InvalidSample(value));
    }
    Ok(())
}

/// Thread-safe handle to one session aggregator.
///
/// Worker threads `observe` while a display thread takes `snapshot`s; every
/// access goes through a single `parking_lot::Mutex`.
#[derive(Debug, Clone, Default)]
pub struct SharedStatistics(Arc<Mutex<StatisticsAggregator>>);

impl SharedStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, value: f64) -> Result<()> {
        self.0.lock().observe(value)
    }

    pub fn observe_all(&self, values: &[f64]) -> Result<()> {
        self.0.lock().observe_all(values)
    }

    pub fn snapshot(&self) -> Result<SplStatistics> {
        self.0.lock().snapshot()
    }

    pub fn reset(&self) {
        self.0.lock().reset();
    }

    pub fn count(&self) -> u64 {
        self.0.lock().count()
    }
}

/// One aggregator per frequency band, fed a full band vector at a time.
///
/// The band decomposition itself happens upstream; this only tracks the
/// per-band min / max / mean that a spectrum display shows next to the
/// current value.
#[derive(Debug, Clone)]
pub struct BandStatistics {
    bands: Vec<StatisticsAggregator>,
}

impl BandStatistics {
    /// # Errors
    /// `InvalidConfiguration` if `band_count` is zero.
    pub fn new(band_count: usize) -> Result<Self> {
        if band_count == 0 {
            return Err(IndicatorError::InvalidConfiguration(
                "band statistics need at least one band".into(),
            ));
        }
        Ok(Self {
            bands: vec![StatisticsAggregator::new(); band_count],
        })
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Fold one level per band.
    ///
    /// # Errors
    /// - `InvalidInput` if `levels.len()` differs from the band count.
    /// - `InvalidSample` if any level is NaN or `+inf` (no band is updated).
    pub fn observe_bands(&mut self, levels: &[f64]) -> Result<()> {
        if levels.len() != self.bands.len() {
            return Err(IndicatorError::InvalidInput(format!(
                "expected {} band levels, got {}",
                self.bands.len(),
                levels.len()
            )));
        }
        for &level in levels {
            validate(level)?;
        }
        for (band, &level) in self.bands.iter_mut().zip(levels) {
            band.apply(level);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Vec<SplStatistics>> {
        self.bands.iter().map(StatisticsAggregator::snapshot).collect()
    }

    pub fn reset(&mut self) {
        self.bands.iter_mut().for_each(StatisticsAggregator::reset);
    }
}
