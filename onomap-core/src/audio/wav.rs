//! Load a calibrated WAV recording as a [`SampleBlock`].
//!
//! Integer PCM is normalised to [-1, 1] by bit depth, float PCM is taken
//! as-is. Interleaved channels are averaged to mono, then every sample is
//! multiplied by `pascal_full_scale`, the pressure (Pa) that the recording
//! chain maps to digital full scale.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::info;

use crate::buffering::block::SampleBlock;
use crate::error::{IndicatorError, Result};

pub fn read_wav_block(path: impl AsRef<Path>, pascal_full_scale: f64) -> Result<SampleBlock> {
    if !(pascal_full_scale.is_finite() && pascal_full_scale > 0.0) {
        return Err(IndicatorError::InvalidInput(format!(
            "calibration must be finite and > 0 Pa, got {pascal_full_scale}"
        )));
    }

    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(IndicatorError::InvalidInput("WAV declares zero channels".into()));
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / full_scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let mono: Vec<f64> = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64 * pascal_full_scale)
        .collect();

    info!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        frames = mono.len(),
        "loaded WAV recording"
    );

    SampleBlock::new(mono, spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hound::{WavSpec, WavWriter};
    use std::path::PathBuf;

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("onomap-{}-{name}.wav", std::process::id()))
    }

    #[test]
    fn int16_stereo_is_mixed_and_scaled() {
        let path = temp_wav("int16");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let block = read_wav_block(&path, 2.0).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(block.sample_rate(), 8_000);
        assert_eq!(block.len(), 100);
        // (0.5 + 0) / 2 · 2 Pa
        assert_abs_diff_eq!(block.samples()[10], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn float_mono_passes_through() {
        let path = temp_wav("float");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 1_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..10 {
            writer.write_sample(i as f32 * 0.125).unwrap();
        }
        writer.finalize().unwrap();

        let block = read_wav_block(&path, 1.0).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(block.len(), 10);
        assert_eq!(block.samples()[8], 1.0);
    }

    #[test]
    fn empty_recording_is_invalid_input() {
        let path = temp_wav("empty");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 1_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        WavWriter::create(&path, spec).unwrap().finalize().unwrap();

        let err = read_wav_block(&path, 1.0).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, IndicatorError::InvalidInput(_)));
    }

    #[test]
    fn missing_file_and_bad_calibration() {
        assert!(read_wav_block(temp_wav("missing"), 1.0).is_err());
        assert!(matches!(
            read_wav_block(temp_wav("missing"), 0.0),
            Err(IndicatorError::InvalidInput(_))
        ));
    }
}
