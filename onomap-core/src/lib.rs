//! # onomap-core
//!
//! Acoustic indicator engine of the OnoMap noise meter.
//!
//! ## Architecture
//!
//! ```text
//! capture (external) → SampleProducer → SPSC RingBuffer → level worker thread
//!                                                              │
//!                                                    get_leq per Fast/Slow sub-block
//!                                                              │
//!                                          SharedStatistics (min / max / mean)
//!                                                              │
//!                                            broadcast::Sender<LevelEvent>
//! ```
//!
//! The indicator functions in [`indicators`] are pure and usable on their own;
//! [`LevelEngine`] wires them into a streaming measurement session.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod events;
pub mod indicators;

// Convenience re-exports for downstream crates
pub use buffering::block::SampleBlock;
pub use engine::{EngineConfig, LevelEngine};
pub use error::{IndicatorError, Result};
pub use events::{LevelEvent, SessionStatus, SessionStatusEvent};
pub use indicators::{
    leq::{get_leq, get_leq_period, get_leq_t},
    stats::{BandStatistics, SharedStatistics, SplStatistics, StatisticsAggregator},
    window::{hann_window, hann_window_f32, hann_window_f64},
    TimePeriod, REF_SOUND_PRESSURE, TIMEPERIOD_FAST, TIMEPERIOD_SLOW,
};
