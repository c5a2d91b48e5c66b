//! Level worker loop.
//!
//! ## Stages (per iteration)
//!
//! ```text
//! 1. Drain ring buffer → scratch buffer
//! 2. Widen to f64 and append to the pending sub-block
//! 3. For every complete sub-block:
//!    a. get_leq at the session reference pressure
//!    b. observe the level into the shared session statistics
//!    c. broadcast a LevelEvent
//! 4. On stop: process what is already queued, drop the partial tail, exit
//! ```
//!
//! Sub-blocks are processed strictly in arrival order on this one thread, so
//! event `seq` order is chronological.

use std::sync::OnceLock;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    buffering::{Consumer, Observer, SampleConsumer},
    engine::EngineConfig,
    events::LevelEvent,
    indicators::{leq::get_leq, stats::SharedStatistics},
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub blocks_processed: AtomicUsize,
    pub blocks_rejected: AtomicUsize,
    pub events_emitted: AtomicUsize,
    pub samples_discarded: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.blocks_processed.store(0, Ordering::Relaxed);
        self.blocks_rejected.store(0, Ordering::Relaxed);
        self.events_emitted.store(0, Ordering::Relaxed);
        self.samples_discarded.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            blocks_rejected: self.blocks_rejected.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            samples_discarded: self.samples_discarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub blocks_processed: usize,
    pub blocks_rejected: usize,
    pub events_emitted: usize,
    pub samples_discarded: usize,
}

/// All context the worker needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub consumer: SampleConsumer,
    pub running: Arc<AtomicBool>,
    pub level_tx: broadcast::Sender<LevelEvent>,
    pub seq: Arc<AtomicU64>,
    pub statistics: SharedStatistics,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Samples drained from the ring per iteration.
const DRAIN_CHUNK: usize = 1_024;

/// Minimum sleep when the ring is empty (avoids busy-wait burning a core).
const DEFAULT_SLEEP_EMPTY_MS: u64 = 5;

/// Run the worker until `ctx.running` becomes false and the queued samples are consumed.
pub fn run(mut ctx: PipelineContext) {
    let sub_len = ctx.config.sub_block_len();
    info!(sub_len, "level worker started");

    let mut raw = vec![0f32; DRAIN_CHUNK];
    let mut pending: Vec<f64> = Vec::with_capacity(sub_len + DRAIN_CHUNK);
    let mut next_start: u64 = 0;

    loop {
        if !ctx.running.load(Ordering::Acquire) {
            // Only what was queued before the stop request is consumed.
            let mut remaining = ctx.consumer.occupied_len();
            while remaining > 0 {
                let take = remaining.min(raw.len());
                let n = ctx.consumer.pop_slice(&mut raw[..take]);
                if n == 0 {
                    break;
                }
                remaining -= n;
                ingest(&ctx, &raw[..n], &mut pending, sub_len, &mut next_start);
            }
            break;
        }

        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(empty_sleep_ms()));
            continue;
        }
        ingest(&ctx, &raw[..n], &mut pending, sub_len, &mut next_start);
    }

    ctx.diagnostics
        .samples_discarded
        .fetch_add(pending.len(), Ordering::Relaxed);

    let d = ctx.diagnostics.snapshot();
    info!(
        samples_in = d.samples_in,
        blocks_processed = d.blocks_processed,
        blocks_rejected = d.blocks_rejected,
        events_emitted = d.events_emitted,
        samples_discarded = d.samples_discarded,
        "level worker stopped"
    );
}

fn ingest(
    ctx: &PipelineContext,
    samples: &[f32],
    pending: &mut Vec<f64>,
    sub_len: usize,
    next_start: &mut u64,
) {
    ctx.diagnostics
        .samples_in
        .fetch_add(samples.len(), Ordering::Relaxed);
    pending.extend(samples.iter().map(|&s| f64::from(s)));

    let mut consumed = 0;
    while pending.len() - consumed >= sub_len {
        process_block(ctx, &pending[consumed..consumed + sub_len], *next_start);
        consumed += sub_len;
        *next_start += sub_len as u64;
    }
    pending.drain(..consumed);
}

fn process_block(ctx: &PipelineContext, block: &[f64], start_sample: u64) {
    let leq = match get_leq(block, ctx.config.reference_pressure) {
        Ok(leq) => leq,
        Err(e) => {
            ctx.diagnostics
                .blocks_rejected
                .fetch_add(1, Ordering::Relaxed);
            warn!(start_sample, "rejecting sub-block: {e}");
            return;
        }
    };

    if let Err(e) = ctx.statistics.observe(leq) {
        ctx.diagnostics
            .blocks_rejected
            .fetch_add(1, Ordering::Relaxed);
        warn!(start_sample, "level not added to session statistics: {e}");
        return;
    }
    ctx.diagnostics
        .blocks_processed
        .fetch_add(1, Ordering::Relaxed);

    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    debug!(seq, start_sample, leq, "sub-block level");

    let event = LevelEvent::new(seq, leq, ctx.config.time_period, start_sample);
    if ctx.level_tx.send(event).is_ok() {
        ctx.diagnostics
            .events_emitted
            .fetch_add(1, Ordering::Relaxed);
    }
}

fn empty_sleep_ms() -> u64 {
    static EMPTY_SLEEP_MS: OnceLock<u64> = OnceLock::new();
    *EMPTY_SLEEP_MS.get_or_init(|| {
        std::env::var("ONOMAP_PIPELINE_EMPTY_SLEEP_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(|v| v.clamp(1, 20))
            .unwrap_or(DEFAULT_SLEEP_EMPTY_MS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffering::{create_sample_ring, push_samples};
    use crate::indicators::{leq::get_leq_t, TimePeriod, REF_SOUND_PRESSURE};

    fn context(
        config: EngineConfig,
        consumer: SampleConsumer,
    ) -> (PipelineContext, broadcast::Receiver<LevelEvent>) {
        let (level_tx, level_rx) = broadcast::channel(64);
        let ctx = PipelineContext {
            config,
            consumer,
            running: Arc::new(AtomicBool::new(false)),
            level_tx,
            seq: Arc::new(AtomicU64::new(0)),
            statistics: SharedStatistics::new(),
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        };
        (ctx, level_rx)
    }

    fn config_1khz() -> EngineConfig {
        EngineConfig {
            sample_rate: 1_000,
            reference_pressure: REF_SOUND_PRESSURE,
            time_period: TimePeriod::Fast,
            ring_capacity: 8_192,
        }
    }

    #[test]
    fn stopped_worker_drains_queue_and_exits() {
        let (mut prod, cons) = create_sample_ring(8_192);
        let samples: Vec<f32> = (0..1_001).map(|i| 0.01 * (1 + i / 125) as f32).collect();
        assert_eq!(push_samples(&mut prod, &samples), 0);

        let (ctx, mut rx) = context(config_1khz(), cons);
        let statistics = ctx.statistics.clone();
        let diagnostics = Arc::clone(&ctx.diagnostics);
        run(ctx);

        let d = diagnostics.snapshot();
        assert_eq!(d.samples_in, 1_001);
        assert_eq!(d.blocks_processed, 8);
        assert_eq!(d.events_emitted, 8);
        assert_eq!(d.samples_discarded, 1);

        let widened: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
        let expected = get_leq_t(&widened, 1_000, 0.125, REF_SOUND_PRESSURE).unwrap();
        for (k, level) in expected.iter().enumerate() {
            let event = rx.try_recv().unwrap();
            assert_eq!(event.seq, k as u64);
            assert_eq!(event.start_sample, k as u64 * 125);
            assert_eq!(event.leq, Some(*level));
        }
        assert_eq!(statistics.count(), 8);
    }

    #[test]
    fn non_finite_block_is_rejected_not_substituted() {
        let (mut prod, cons) = create_sample_ring(1_024);
        let mut samples = vec![0.1f32; 250];
        samples[130] = f32::NAN;
        push_samples(&mut prod, &samples);

        let (ctx, _rx) = context(config_1khz(), cons);
        let statistics = ctx.statistics.clone();
        let diagnostics = Arc::clone(&ctx.diagnostics);
        run(ctx);

        let d = diagnostics.snapshot();
        assert_eq!(d.blocks_processed, 1);
        assert_eq!(d.blocks_rejected, 1);
        assert_eq!(statistics.count(), 1);
    }

    #[test]
    fn silent_blocks_emit_null_levels() {
        let (mut prod, cons) = create_sample_ring(1_024);
        push_samples(&mut prod, &[0.0f32; 125]);

        let (ctx, mut rx) = context(config_1khz(), cons);
        let statistics = ctx.statistics.clone();
        run(ctx);

        assert_eq!(rx.try_recv().unwrap().leq, None);
        assert_eq!(statistics.snapshot().unwrap().min, f64::NEG_INFINITY);
    }
}
