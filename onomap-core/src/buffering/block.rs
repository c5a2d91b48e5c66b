//! Typed sample block handed from the capture side to the level calculator.

use crate::error::{IndicatorError, Result};
use crate::indicators::{self, TimePeriod};

/// A contiguous block of mono sound-pressure samples at a known sample rate.
///
/// Always non-empty and finite; constructed through [`SampleBlock::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl SampleBlock {
    /// Wrap `samples` (pascals) captured at `sample_rate` Hz.
    ///
    /// # Errors
    /// `InvalidInput` for an empty block, a zero sample rate or any
    /// non-finite sample.
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(IndicatorError::InvalidInput("sample block is empty".into()));
        }
        if sample_rate == 0 {
            return Err(IndicatorError::InvalidInput("sample rate must be > 0".into()));
        }
        if let Some(idx) = samples.iter().position(|s| !s.is_finite()) {
            return Err(IndicatorError::InvalidInput(format!(
                "non-finite sample at index {idx}"
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Mutable access for in-place windowing. Length cannot change.
    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the duration of this block in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Equivalent level of the whole block.
    pub fn leq(&self, reference_pressure: f64) -> Result<f64> {
        indicators::leq::get_leq(&self.samples, reference_pressure)
    }

    /// Level sequence over consecutive `period`-long sub-blocks.
    pub fn leq_t(&self, period: TimePeriod, reference_pressure: f64) -> Result<Vec<f64>> {
        indicators::leq::get_leq_period(&self.samples, self.sample_rate, period, reference_pressure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{window::hann_window_f64, REF_SOUND_PRESSURE};

    #[test]
    fn rejects_empty_block() {
        let err = SampleBlock::new(vec![], 44_100).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidInput(_)));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(SampleBlock::new(vec![0.1], 0).is_err());
    }

    #[test]
    fn rejects_non_finite_samples() {
        let err = SampleBlock::new(vec![0.1, f64::NAN, 0.2], 8_000).unwrap_err();
        assert!(err.to_string().contains("index 1"), "err={err}");
        assert!(SampleBlock::new(vec![f64::INFINITY], 8_000).is_err());
    }

    #[test]
    fn duration_follows_sample_rate() {
        let block = SampleBlock::new(vec![0.0; 4_000], 8_000).unwrap();
        assert!((block.duration_secs() - 0.5).abs() < 1e-12);
        assert_eq!(block.len(), 4_000);
    }

    #[test]
    fn leq_t_uses_block_sample_rate() {
        let block = SampleBlock::new(vec![0.02; 2_000], 1_000).unwrap();
        let slow = block.leq_t(TimePeriod::Slow, REF_SOUND_PRESSURE).unwrap();
        let fast = block.leq_t(TimePeriod::Fast, REF_SOUND_PRESSURE).unwrap();
        assert_eq!(slow.len(), 2);
        assert_eq!(fast.len(), 16);
    }

    #[test]
    fn windowing_in_place_tapers_block() {
        let mut block = SampleBlock::new(vec![0.02; 1_000], 1_000).unwrap();
        let flat = block.leq(REF_SOUND_PRESSURE).unwrap();

        hann_window_f64(block.samples_mut());

        assert_eq!(block.len(), 1_000);
        assert_eq!(block.samples()[0], 0.02);
        assert!(block.samples()[999].abs() < 1e-12);
        // Hann mean square is 3/8 of the flat signal.
        let tapered = block.leq(REF_SOUND_PRESSURE).unwrap();
        assert!((flat - tapered - 10.0 * (8.0f64 / 3.0).log10()).abs() < 0.05);
    }
}
