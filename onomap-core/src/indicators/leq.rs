//! Equivalent continuous sound pressure level (Leq).
//!
//! ## Algorithm
//!
//! ```text
//! Leq = 10 · log10( Σ x[i]² / (N · p_ref²) )     i = 1 .. N-1
//! ```
//!
//! The sum starts at index 1: the head sample of every block is left out
//! while `N` stays the divisor. Callers and tests rely on this exact boundary.
//! A block whose summed energy is zero yields `-inf` dB.

use tracing::debug;

use super::{check_reference_pressure, sub_block_len, TimePeriod};
use crate::error::{IndicatorError, Result};

/// Equivalent sound pressure level of `signal` (Pa) in dB re `reference_pressure`.
///
/// # Errors
/// `InvalidInput` if `signal` is empty, contains a non-finite sample, or
/// `reference_pressure` is not a positive finite number. Also `InvalidInput`
/// when the squared sum overflows `f64`.
pub fn get_leq(signal: &[f64], reference_pressure: f64) -> Result<f64> {
    check_signal(signal)?;
    check_reference_pressure(reference_pressure)?;
    leq_checked(signal, reference_pressure)
}

/// Equivalent levels over consecutive, non-overlapping `time_period`-second
/// sub-blocks of `signal`, in chronological order.
///
/// The sub-block length is `floor(time_period × sample_rate)`; a trailing
/// remainder shorter than that is discarded, never padded.
///
/// # Errors
/// - `InvalidConfiguration` when `sample_rate` is zero, `time_period` is not a
///   positive finite number, or the sub-block would hold no sample.
/// - `InvalidInput` for an empty/non-finite signal or a bad reference pressure.
pub fn get_leq_t(
    signal: &[f64],
    sample_rate: u32,
    time_period: f64,
    reference_pressure: f64,
) -> Result<Vec<f64>> {
    if sample_rate == 0 {
        return Err(IndicatorError::InvalidConfiguration(
            "sample rate must be > 0".into(),
        ));
    }
    if !(time_period.is_finite() && time_period > 0.0) {
        return Err(IndicatorError::InvalidConfiguration(format!(
            "time period must be finite and > 0, got {time_period}"
        )));
    }
    let sub_len = sub_block_len(time_period, sample_rate);
    if sub_len < 1 {
        return Err(IndicatorError::InvalidConfiguration(format!(
            "time period {time_period} s at {sample_rate} Hz yields an empty sub-block"
        )));
    }
    check_signal(signal)?;
    check_reference_pressure(reference_pressure)?;

    let levels = signal
        .chunks_exact(sub_len)
        .map(|sub| leq_checked(sub, reference_pressure))
        .collect::<Result<Vec<f64>>>()?;

    debug!(
        sub_len,
        blocks = levels.len(),
        discarded = signal.len() % sub_len,
        "segmented leq"
    );

    Ok(levels)
}

/// [`get_leq_t`] for one of the standard time constants.
pub fn get_leq_period(
    signal: &[f64],
    sample_rate: u32,
    period: TimePeriod,
    reference_pressure: f64,
) -> Result<Vec<f64>> {
    get_leq_t(signal, sample_rate, period.seconds(), reference_pressure)
}

/// Level of a block already known to be non-empty and finite.
///
/// Only `-inf` (zero energy) may leave here; an overflowed sum is an error.
fn leq_checked(signal: &[f64], reference_pressure: f64) -> Result<f64> {
    let sqr_ref = reference_pressure * reference_pressure;
    let sum_sq: f64 = signal.iter().skip(1).map(|s| s * s).sum();
    let level = 10.0 * (sum_sq / (signal.len() as f64 * sqr_ref)).log10();
    if level.is_nan() || level == f64::INFINITY {
        return Err(IndicatorError::InvalidInput(format!(
            "signal energy overflows ({} samples)",
            signal.len()
        )));
    }
    Ok(level)
}

fn check_signal(signal: &[f64]) -> Result<()> {
    if signal.is_empty() {
        return Err(IndicatorError::InvalidInput("signal is empty".into()));
    }
    if let Some(idx) = signal.iter().position(|s| !s.is_finite()) {
        return Err(IndicatorError::InvalidInput(format!(
            "non-finite sample at index {idx}"
        )));
    }
    Ok(())
}
