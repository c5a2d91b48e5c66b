//! `LevelEngine`: measurement session lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! LevelEngine::new(config)
//!     └─► start()        → ring created, worker spawned, status = Measuring
//!         │                 returns the SampleProducer for the capture side
//!         └─► stop()     → running=false, worker drains + joins, status = Stopped
//! ```
//!
//! `start()`/`stop()` called in the wrong state return an error rather than
//! panicking. Each `start()` opens a new session: statistics, diagnostics and
//! the event sequence are cleared.
//!
//! ## Threading
//!
//! The capture collaborator owns the producer half of the ring and must never
//! block; the worker thread owns the consumer half and does all the
//! allocation and arithmetic. The session statistics are the only state shared
//! with readers, behind one `parking_lot::Mutex`.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::{
    buffering::{create_sample_ring, SampleProducer, DEFAULT_RING_CAPACITY},
    error::{IndicatorError, Result},
    events::{LevelEvent, SessionStatus, SessionStatusEvent},
    indicators::{
        check_reference_pressure,
        stats::{SharedStatistics, SplStatistics},
        TimePeriod, REF_SOUND_PRESSURE,
    },
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `LevelEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sample rate of the incoming capture stream (Hz). Default: 44100.
    pub sample_rate: u32,
    /// Calibration reference (Pa). Default: 2e-5.
    pub reference_pressure: f64,
    /// Integration period of each emitted level. Default: Fast.
    pub time_period: TimePeriod,
    /// Ring buffer capacity in samples. Default: 2^20.
    pub ring_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            reference_pressure: REF_SOUND_PRESSURE,
            time_period: TimePeriod::Fast,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Samples per emitted level.
    pub fn sub_block_len(&self) -> usize {
        self.time_period.sub_block_len(self.sample_rate)
    }

    /// # Errors
    /// - `InvalidConfiguration` for a zero sample rate, a zero ring capacity,
    ///   or a period/rate pair that yields an empty sub-block.
    /// - `InvalidInput` for a non-positive reference pressure.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(IndicatorError::InvalidConfiguration(
                "sample rate must be > 0".into(),
            ));
        }
        if self.ring_capacity == 0 {
            return Err(IndicatorError::InvalidConfiguration(
                "ring capacity must be > 0".into(),
            ));
        }
        if self.sub_block_len() < 1 {
            return Err(IndicatorError::InvalidConfiguration(format!(
                "{} period at {} Hz yields an empty sub-block",
                self.time_period, self.sample_rate
            )));
        }
        check_reference_pressure(self.reference_pressure)
    }
}

/// The top-level engine handle.
///
/// `LevelEngine` is `Send + Sync`; wrap it in an `Arc` to share it between the
/// capture boundary and display consumers.
pub struct LevelEngine {
    config: EngineConfig,
    /// `true` while a session worker is active.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<SessionStatus>>,
    level_tx: broadcast::Sender<LevelEvent>,
    status_tx: broadcast::Sender<SessionStatusEvent>,
    /// Level event sequence counter, restarted per session.
    seq: Arc<AtomicU64>,
    statistics: SharedStatistics,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LevelEngine {
    /// Create an idle engine. Does not start a session; call `start()`.
    ///
    /// # Errors
    /// Propagates [`EngineConfig::validate`] failures.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (level_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(SessionStatus::Idle)),
            level_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            statistics: SharedStatistics::new(),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a new session and spawn the level worker.
    ///
    /// Returns the producer half of the sample ring; the capture side pushes
    /// mono pressure samples (Pa) into it, e.g. with
    /// [`crate::buffering::push_samples`].
    ///
    /// # Errors
    /// - `IndicatorError::EngineAlreadyRunning` if a session is active.
    /// - `IndicatorError::Io` if the worker thread cannot be spawned.
    pub fn start(&self) -> Result<SampleProducer> {
        let mut worker = self.worker.lock();
        if self.running.load(Ordering::SeqCst) {
            return Err(IndicatorError::EngineAlreadyRunning);
        }

        self.statistics.reset();
        self.diagnostics.reset();
        self.seq.store(0, Ordering::SeqCst);

        let (producer, consumer) = create_sample_ring(self.config.ring_capacity);
        self.running.store(true, Ordering::SeqCst);

        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            consumer,
            running: Arc::clone(&self.running),
            level_tx: self.level_tx.clone(),
            seq: Arc::clone(&self.seq),
            statistics: self.statistics.clone(),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        let handle = std::thread::Builder::new()
            .name("onomap-level-worker".into())
            .spawn(move || pipeline::run(ctx));

        match handle {
            Ok(handle) => {
                *worker = Some(handle);
                self.set_status(SessionStatus::Measuring, None);
                info!(
                    sample_rate = self.config.sample_rate,
                    period = %self.config.time_period,
                    sub_block = self.config.sub_block_len(),
                    "measurement session started"
                );
                Ok(producer)
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                Err(IndicatorError::Io(e))
            }
        }
    }

    /// End the session: the worker finishes every complete sub-block already
    /// queued, drops the partial tail and exits before this returns.
    ///
    /// # Errors
    /// - `IndicatorError::EngineNotRunning` if no session is active.
    /// - `IndicatorError::Other` if the worker panicked.
    pub fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if !self.running.load(Ordering::SeqCst) {
            return Err(IndicatorError::EngineNotRunning);
        }

        self.running.store(false, Ordering::SeqCst);
        info!("measurement session stop requested");

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                error!("level worker panicked");
                self.set_status(SessionStatus::Error, Some("level worker panicked".into()));
                return Err(IndicatorError::Other(anyhow::anyhow!(
                    "level worker panicked"
                )));
            }
        }

        self.set_status(SessionStatus::Stopped, None);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the session statistics without stopping the worker.
    pub fn reset_session(&self) {
        self.statistics.reset();
        info!("session statistics reset");
    }

    /// Min / max / mean of every level emitted in the current session.
    pub fn statistics(&self) -> Result<SplStatistics> {
        self.statistics.snapshot()
    }

    /// Handle to the session statistics, for readers on other threads.
    pub fn shared_statistics(&self) -> SharedStatistics {
        self.statistics.clone()
    }

    /// Current session status (snapshot).
    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Subscribe to per-sub-block level events.
    pub fn subscribe(&self) -> broadcast::Receiver<LevelEvent> {
        self.level_tx.subscribe()
    }

    /// Subscribe to session status changes.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of worker counters for observability.
    pub fn diagnostics(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: SessionStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(SessionStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Drop for LevelEngine {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 1_000,
            ring_capacity: 4_096,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sub_block_len(), 5_512);
    }

    #[test]
    fn degenerate_sub_block_is_rejected() {
        let config = EngineConfig {
            sample_rate: 4,
            ..EngineConfig::default()
        };
        assert!(matches!(
            LevelEngine::new(config),
            Err(IndicatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn bad_reference_and_capacity_are_rejected() {
        let config = EngineConfig {
            reference_pressure: 0.0,
            ..small_config()
        };
        assert!(matches!(
            config.validate(),
            Err(IndicatorError::InvalidInput(_))
        ));

        let config = EngineConfig {
            ring_capacity: 0,
            ..small_config()
        };
        assert!(matches!(
            config.validate(),
            Err(IndicatorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn start_twice_fails() {
        let engine = LevelEngine::new(small_config()).unwrap();
        let _producer = engine.start().unwrap();
        assert!(matches!(
            engine.start(),
            Err(IndicatorError::EngineAlreadyRunning)
        ));
        engine.stop().unwrap();
    }

    #[test]
    fn stop_when_idle_fails() {
        let engine = LevelEngine::new(small_config()).unwrap();
        assert!(matches!(engine.stop(), Err(IndicatorError::EngineNotRunning)));
        assert_eq!(engine.status(), SessionStatus::Idle);
    }

    #[test]
    fn status_follows_lifecycle() {
        let engine = LevelEngine::new(small_config()).unwrap();
        let mut status_rx = engine.subscribe_status();

        let _producer = engine.start().unwrap();
        assert_eq!(engine.status(), SessionStatus::Measuring);
        assert!(engine.is_running());

        engine.stop().unwrap();
        assert_eq!(engine.status(), SessionStatus::Stopped);
        assert!(!engine.is_running());

        assert_eq!(status_rx.try_recv().unwrap().status, SessionStatus::Measuring);
        assert_eq!(status_rx.try_recv().unwrap().status, SessionStatus::Stopped);
    }

    #[test]
    fn session_without_samples_has_no_statistics() {
        let engine = LevelEngine::new(small_config()).unwrap();
        let _producer = engine.start().unwrap();
        engine.stop().unwrap();
        assert!(matches!(
            engine.statistics(),
            Err(IndicatorError::InvalidConfiguration(_))
        ));
    }
}
