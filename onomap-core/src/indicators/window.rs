//! Hann analysis window, applied in place before spectral decomposition.
//!
//! For `n` in `1..N`: `x[n] *= 0.5 · (1 − cos(2π·n / (N − 1)))`.
//! Index 0 is left as-is rather than forced to zero. Both precisions share
//! the same `f64` coefficient so an `f32` spectral path windows identically.

use std::f64::consts::PI;

/// Sample types the window can scale in place.
pub trait WindowSample: Copy {
    /// Multiply by an `f64` coefficient, rounding back to `Self`.
    fn scale(self, coefficient: f64) -> Self;
}

impl WindowSample for f64 {
    #[inline]
    fn scale(self, coefficient: f64) -> Self {
        self * coefficient
    }
}

impl WindowSample for f32 {
    #[inline]
    fn scale(self, coefficient: f64) -> Self {
        (self as f64 * coefficient) as f32
    }
}

#[inline]
fn coefficient(n: usize, len: usize) -> f64 {
    0.5 * (1.0 - ((2.0 * PI * n as f64) / (len - 1) as f64).cos())
}

/// Taper `signal` in place and hand the same buffer back.
///
/// Blocks of zero or one sample are returned unchanged.
pub fn hann_window<T: WindowSample>(signal: &mut [T]) -> &mut [T] {
    let len = signal.len();
    for (n, sample) in signal.iter_mut().enumerate().skip(1) {
        *sample = sample.scale(coefficient(n, len));
    }
    signal
}

pub fn hann_window_f64(signal: &mut [f64]) -> &mut [f64] {
    hann_window(signal)
}

pub fn hann_window_f32(signal: &mut [f32]) -> &mut [f32] {
    hann_window(signal)
}

/// Effective per-index gains of [`hann_window`] for a block of `len` samples.
///
/// Entry 0 is `1.0` since the head sample is never scaled.
pub fn hann_coefficients(len: usize) -> Vec<f64> {
    let mut gains = vec![1.0; len];
    hann_window(&mut gains);
    gains
}
