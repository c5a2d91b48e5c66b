//! Acoustic indicators: equivalent levels, analysis window, session statistics.
//!
//! Every function here is pure with respect to shared state: it only touches
//! its own input, so callers may run it on any worker thread without locking.
//! The one piece of shared mutable state is [`stats::SharedStatistics`].

pub mod leq;
pub mod stats;
pub mod window;

use serde::{Deserialize, Serialize};

/// Integration period of the Slow time constant (s).
pub const TIMEPERIOD_SLOW: f64 = 1.0;

/// Integration period of the Fast time constant (s).
pub const TIMEPERIOD_FAST: f64 = 0.125;

/// Reference sound pressure (Pa), the nominal threshold of hearing.
pub const REF_SOUND_PRESSURE: f64 = 0.00002;

/// Standard sound level meter time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    /// 125 ms.
    #[default]
    Fast,
    /// 1 s.
    Slow,
}

impl TimePeriod {
    pub fn seconds(self) -> f64 {
        match self {
            TimePeriod::Fast => TIMEPERIOD_FAST,
            TimePeriod::Slow => TIMEPERIOD_SLOW,
        }
    }

    /// Number of samples in one sub-block at `sample_rate` (truncated).
    pub fn sub_block_len(self, sample_rate: u32) -> usize {
        sub_block_len(self.seconds(), sample_rate)
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimePeriod::Fast => f.write_str("fast"),
            TimePeriod::Slow => f.write_str("slow"),
        }
    }
}

impl std::str::FromStr for TimePeriod {
    type Err = crate::error::IndicatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "f" => Ok(TimePeriod::Fast),
            "slow" | "s" => Ok(TimePeriod::Slow),
            other => Err(crate::error::IndicatorError::InvalidConfiguration(format!(
                "unknown time period '{other}' (expected fast or slow)"
            ))),
        }
    }
}

pub(crate) fn sub_block_len(time_period: f64, sample_rate: u32) -> usize {
    (time_period * sample_rate as f64).floor() as usize
}

/// Validate a calibration reference: finite and strictly positive.
pub(crate) fn check_reference_pressure(reference_pressure: f64) -> crate::error::Result<()> {
    if reference_pressure.is_finite() && reference_pressure > 0.0 {
        Ok(())
    } else {
        Err(crate::error::IndicatorError::InvalidInput(format!(
            "reference pressure must be finite and > 0, got {reference_pressure}"
        )))
    }
}
