use thiserror::Error;

/// All errors produced by onomap-core.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// Empty or malformed sample sequence, or a non-positive reference pressure.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Time period / sample rate combination that cannot produce a sub-block,
    /// or a query that has no defined answer (e.g. statistics with no observations).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Non-finite level offered to a statistics aggregator.
    #[error("invalid sample offered to aggregator: {0}")]
    InvalidSample(f64),

    #[error("measurement session is already running")]
    EngineAlreadyRunning,

    #[error("measurement session is not running")]
    EngineNotRunning,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IndicatorError>;
