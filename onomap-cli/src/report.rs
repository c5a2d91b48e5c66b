//! Measurement report built from one recording.
//!
//! Silent sub-blocks (`-inf` dB) serialise as JSON `null`.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use onomap_core::buffering::Producer;
use onomap_core::engine::pipeline::DiagnosticsSnapshot;
use onomap_core::{
    get_leq, get_leq_period, LevelEngine, SampleBlock, SplStatistics, StatisticsAggregator,
    TimePeriod,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::settings::MeterSettings;
use collector::collect_levels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Indicators computed directly on the whole recording.
    Offline,
    /// Recording replayed through a live measurement session.
    Streamed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementReport {
    pub input: String,
    pub generated_at: DateTime<Utc>,
    pub mode: ReportMode,
    pub sample_rate: u32,
    pub sample_count: usize,
    pub duration_secs: f64,
    pub reference_pressure: f64,
    /// Level of the whole recording.
    pub leq: f64,
    pub fast: Vec<f64>,
    pub slow: Vec<f64>,
    /// Period whose sequence feeds `statistics`.
    pub period: TimePeriod,
    /// `None` when the recording is shorter than one period.
    pub statistics: Option<SplStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<DiagnosticsSnapshot>,
}

impl MeasurementReport {
    fn base(
        input: &str,
        block: &SampleBlock,
        settings: &MeterSettings,
        mode: ReportMode,
    ) -> Result<Self> {
        let rate = block.sample_rate();
        let reference = settings.reference_pressure;
        Ok(Self {
            input: input.to_string(),
            generated_at: Utc::now(),
            mode,
            sample_rate: rate,
            sample_count: block.len(),
            duration_secs: block.duration_secs(),
            reference_pressure: reference,
            leq: get_leq(block.samples(), reference)?,
            fast: get_leq_period(block.samples(), rate, TimePeriod::Fast, reference)?,
            slow: get_leq_period(block.samples(), rate, TimePeriod::Slow, reference)?,
            period: settings.time_period,
            statistics: None,
            diagnostics: None,
        })
    }

    fn selected(&self) -> &[f64] {
        match self.period {
            TimePeriod::Fast => &self.fast,
            TimePeriod::Slow => &self.slow,
        }
    }
}

/// Compute every indicator directly on the decoded recording.
pub fn offline_report(
    input: &str,
    block: &SampleBlock,
    settings: &MeterSettings,
) -> Result<MeasurementReport> {
    let mut report = MeasurementReport::base(input, block, settings, ReportMode::Offline)?;

    let mut aggregator = StatisticsAggregator::new();
    aggregator.observe_all(report.selected())?;
    report.statistics = (!aggregator.is_empty())
        .then(|| aggregator.snapshot())
        .transpose()?;

    info!(levels = report.selected().len(), "offline indicators computed");
    Ok(report)
}

/// Replay the recording through a `LevelEngine` in capture-sized chunks and
/// report the session statistics it accumulated.
pub fn streamed_report(
    input: &str,
    block: &SampleBlock,
    settings: &MeterSettings,
) -> Result<MeasurementReport> {
    let mut report = MeasurementReport::base(input, block, settings, ReportMode::Streamed)?;

    let engine = LevelEngine::new(settings.engine_config(block.sample_rate()))
        .context("invalid session configuration")?;
    let collector = collect_levels(engine.subscribe());
    let mut producer = engine.start().context("failed to start measurement session")?;

    let samples: Vec<f32> = block.samples().iter().map(|&s| s as f32).collect();
    for chunk in samples.chunks(settings.stream_chunk) {
        // Offline input can wait for room instead of dropping like live capture would.
        let mut written = 0;
        while written < chunk.len() {
            written += producer.push_slice(&chunk[written..]);
            if written < chunk.len() {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    engine.stop().context("failed to stop measurement session")?;
    report.diagnostics = Some(engine.diagnostics());
    report.statistics = match engine.statistics() {
        Ok(stats) => Some(stats),
        Err(onomap_core::IndicatorError::InvalidConfiguration(_)) => None,
        Err(e) => return Err(e.into()),
    };
    // Dropping the engine closes the level channel and ends the collector.
    drop(engine);

    let streamed = collector
        .join()
        .map_err(|_| anyhow!("level collector panicked"))?;
    if streamed.len() != report.selected().len() {
        warn!(
            streamed = streamed.len(),
            offline = report.selected().len(),
            "streamed level count differs from offline segmentation"
        );
    }
    Ok(report)
}

mod collector {
    //! Drains a broadcast receiver on a plain thread until the sender closes.

    use std::thread::{self, JoinHandle};

    use onomap_core::LevelEvent;
    use tokio::sync::broadcast::{self, error::RecvError};
    use tracing::warn;

    pub fn collect_levels(
        mut rx: broadcast::Receiver<LevelEvent>,
    ) -> JoinHandle<Vec<Option<f64>>> {
        thread::spawn(move || {
            let mut levels = Vec::new();
            loop {
                match rx.blocking_recv() {
                    Ok(event) => levels.push(event.leq),
                    Err(RecvError::Lagged(missed)) => warn!(missed, "level collector lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
            levels
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(len: usize, rate: u32) -> SampleBlock {
        let samples = (0..len)
            .map(|i| 0.02 * ((i as f64) * 0.05).sin() * (1.0 + (i / rate as usize) as f64))
            .collect();
        SampleBlock::new(samples, rate).unwrap()
    }

    #[test]
    fn offline_report_segments_both_periods() {
        let report =
            offline_report("tone.wav", &block(2_500, 1_000), &MeterSettings::default()).unwrap();
        assert_eq!(report.mode, ReportMode::Offline);
        assert_eq!(report.fast.len(), 20);
        assert_eq!(report.slow.len(), 2);
        let stats = report.statistics.unwrap();
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
    }

    #[test]
    fn short_recording_has_no_statistics() {
        let report =
            offline_report("blip.wav", &block(50, 1_000), &MeterSettings::default()).unwrap();
        assert!(report.fast.is_empty());
        assert!(report.statistics.is_none());
    }

    #[test]
    fn streamed_report_agrees_with_offline() {
        let settings = MeterSettings {
            ring_capacity: 4_096,
            stream_chunk: 100,
            ..MeterSettings::default()
        };
        let input = block(3_000, 1_000);
        let offline = offline_report("a.wav", &input, &settings).unwrap();
        let streamed = streamed_report("a.wav", &input, &settings).unwrap();

        let d = streamed.diagnostics.unwrap();
        assert_eq!(d.blocks_processed, 24);
        let (a, b) = (offline.statistics.unwrap(), streamed.statistics.unwrap());
        // The ring carries f32, so levels agree to single precision.
        assert!((a.mean - b.mean).abs() < 1e-4, "{a:?} vs {b:?}");
        assert!((a.max - b.max).abs() < 1e-4, "{a:?} vs {b:?}");
    }

    #[test]
    fn report_serializes_camel_case() {
        let report =
            offline_report("x.wav", &block(1_000, 1_000), &MeterSettings::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sampleRate"], 1_000);
        assert_eq!(json["mode"], "offline");
        assert_eq!(json["period"], "fast");
        assert!(json.get("diagnostics").is_none());
    }
}
