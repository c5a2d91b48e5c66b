//! Meter settings (JSON file, camelCase keys, every field optional).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use onomap_core::{
    buffering::DEFAULT_RING_CAPACITY, EngineConfig, TimePeriod, REF_SOUND_PRESSURE,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct MeterSettings {
    /// Calibration reference (Pa).
    pub reference_pressure: f64,
    /// Pressure (Pa) mapped to digital full scale by the recording chain.
    pub pascal_full_scale: f64,
    pub time_period: TimePeriod,
    pub ring_capacity: usize,
    /// Samples pushed per simulated capture callback in `--stream` mode.
    pub stream_chunk: usize,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            reference_pressure: REF_SOUND_PRESSURE,
            pascal_full_scale: 1.0,
            time_period: TimePeriod::Fast,
            ring_capacity: DEFAULT_RING_CAPACITY,
            stream_chunk: 1_024,
        }
    }
}

impl MeterSettings {
    pub fn normalize(&mut self) {
        self.ring_capacity = self.ring_capacity.clamp(1 << 12, 1 << 26);
        self.stream_chunk = self.stream_chunk.clamp(16, 1 << 16);
    }

    pub fn engine_config(&self, sample_rate: u32) -> EngineConfig {
        EngineConfig {
            sample_rate,
            reference_pressure: self.reference_pressure,
            time_period: self.time_period,
            ring_capacity: self.ring_capacity,
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("OnoMap")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("onomap")
            .join("settings.json")
    }
}

/// Load settings from `path`. A missing file yields the defaults; a file that
/// exists but cannot be parsed is an error rather than a silent fallback.
pub fn load_settings(path: &Path) -> Result<MeterSettings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<MeterSettings>(&raw)
            .with_context(|| format!("malformed settings file {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => MeterSettings::default(),
        Err(e) => {
            return Err(e).with_context(|| format!("cannot read settings {}", path.display()))
        }
    };
    settings.normalize();
    Ok(settings)
}
