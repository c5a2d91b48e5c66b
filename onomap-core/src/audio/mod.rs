//! Offline sample sources.
//!
//! Live microphone capture belongs to the host application: it pushes into the
//! ring returned by `LevelEngine::start`. This module only turns recordings
//! into [`crate::SampleBlock`]s.

pub mod wav;

pub use wav::read_wav_block;
