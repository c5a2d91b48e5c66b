//! Event types broadcast by a running measurement session.
//!
//! Consumers (display, export) subscribe through `LevelEngine::subscribe` and
//! `LevelEngine::subscribe_status`. All types serialise with camelCase fields
//! and lowercase enum values so they can be forwarded as JSON unchanged.

use serde::{Deserialize, Serialize};

use crate::indicators::TimePeriod;

// ---------------------------------------------------------------------------
// Level events
// ---------------------------------------------------------------------------

/// Emitted once per completed sub-block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEvent {
    /// Monotonically increasing event sequence number within the session.
    pub seq: u64,
    /// Equivalent level of the sub-block in dB. `None` when the block was
    /// silent (`-inf` dB), which JSON cannot carry.
    pub leq: Option<f64>,
    /// Integration period of the sub-block.
    pub period: TimePeriod,
    /// Index of the first sample of the sub-block since session start.
    pub start_sample: u64,
}

impl LevelEvent {
    pub fn new(seq: u64, leq: f64, period: TimePeriod, start_sample: u64) -> Self {
        Self {
            seq,
            leq: leq.is_finite().then_some(leq),
            period,
            start_sample,
        }
    }
}

// ---------------------------------------------------------------------------
// Session status events
// ---------------------------------------------------------------------------

/// Emitted when the session state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of a measurement session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Engine created, no session started yet.
    Idle,
    /// Worker running and consuming samples.
    Measuring,
    /// Session ended; the engine may be restarted.
    Stopped,
    /// Worker failed; restart required.
    Error,
}
