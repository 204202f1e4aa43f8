//! Session configuration: file loading and startup validation.

pub mod paths;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GateError, GateResult};
use paths::get_data_dir;

/// Smallest noise window the gate will calibrate against.
pub const MIN_WINDOW_BLOCKS: usize = 4;

/// Largest noise window accepted: about 6.6 hours of default-sized blocks.
pub const MAX_WINDOW_BLOCKS: usize = 1 << 20;

/// Which capture device to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSelector {
    /// Position in the host's input device list.
    Index(usize),
    /// Exact device name.
    Name(String),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// sound_gate.json shape. Every field is optional and falls back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub sample_rate: u32,
    /// Frames per processed block (~23 ms at 44.1 kHz by default).
    pub block_size: usize,
    /// How long the room noise is learned before the gate may open.
    pub calibration_seconds: f64,
    /// Energy must exceed `mean + attack_factor * std` to turn ON.
    pub attack_factor: f64,
    /// Energy must drop below `mean + release_factor * std` to turn OFF.
    pub release_factor: f64,
    pub min_on_time_seconds: f64,
    pub min_off_time_seconds: f64,
    /// Pre-emphasis coefficient in [0, 1). 0 disables the filter.
    pub preemphasis: f64,
    /// `null` selects the host default input.
    pub input_device: Option<DeviceSelector>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 1024,
            calibration_seconds: 2.0,
            attack_factor: 6.0,
            release_factor: 2.5,
            min_on_time_seconds: 0.08,
            min_off_time_seconds: 0.05,
            preemphasis: 0.97,
            input_device: None,
        }
    }
}

/// Checked, immutable parameters derived from a [`GateConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateParams {
    pub sample_rate: u32,
    pub block_size: usize,
    pub window_capacity: usize,
    pub attack_factor: f64,
    pub release_factor: f64,
    pub min_on_time: Duration,
    pub min_off_time: Duration,
    pub preemphasis: f32,
}

impl GateConfig {
    /// Number of blocks the noise window holds, before validation.
    ///
    /// Whole blocks only: 2 s at 44.1 kHz with 1024-frame blocks is 86.
    /// Saturates at `usize::MAX`.
    pub fn raw_window_capacity(&self) -> usize {
        let blocks = self.window_blocks();
        if blocks <= 0.0 {
            0
        } else if blocks >= usize::MAX as f64 {
            usize::MAX
        } else {
            blocks.floor() as usize
        }
    }

    fn window_blocks(&self) -> f64 {
        if self.block_size == 0 || !self.calibration_seconds.is_finite() {
            return 0.0;
        }
        self.calibration_seconds * self.sample_rate as f64 / self.block_size as f64
    }

    /// Reject any configuration the gate cannot run with.
    pub fn validate(&self) -> GateResult<GateParams> {
        if self.sample_rate == 0 {
            return Err(GateError::invalid("sample_rate must be positive"));
        }
        if self.block_size == 0 {
            return Err(GateError::invalid("block_size must be positive"));
        }
        if !self.calibration_seconds.is_finite() || self.calibration_seconds <= 0.0 {
            return Err(GateError::invalid(format!(
                "calibration_seconds must be a positive number, got {}",
                self.calibration_seconds
            )));
        }
        let capacity = self.raw_window_capacity();
        if capacity < MIN_WINDOW_BLOCKS {
            return Err(GateError::invalid(format!(
                "calibration of {}s covers {} blocks, need at least {}",
                self.calibration_seconds, capacity, MIN_WINDOW_BLOCKS
            )));
        }
        if capacity > MAX_WINDOW_BLOCKS {
            return Err(GateError::invalid(format!(
                "calibration of {}s covers more than {} blocks",
                self.calibration_seconds, MAX_WINDOW_BLOCKS
            )));
        }
        if !self.attack_factor.is_finite() || !self.release_factor.is_finite() {
            return Err(GateError::invalid("attack/release factors must be finite"));
        }
        if self.release_factor >= self.attack_factor {
            return Err(GateError::invalid(format!(
                "release_factor ({}) must be less than attack_factor ({})",
                self.release_factor, self.attack_factor
            )));
        }
        let min_on_time = dwell(self.min_on_time_seconds, "min_on_time_seconds")?;
        let min_off_time = dwell(self.min_off_time_seconds, "min_off_time_seconds")?;
        if !(0.0..1.0).contains(&self.preemphasis) {
            return Err(GateError::invalid(format!(
                "preemphasis must be in [0, 1), got {}",
                self.preemphasis
            )));
        }

        Ok(GateParams {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            window_capacity: capacity.max(MIN_WINDOW_BLOCKS),
            attack_factor: self.attack_factor,
            release_factor: self.release_factor,
            min_on_time,
            min_off_time,
            preemphasis: self.preemphasis as f32,
        })
    }
}

fn dwell(seconds: f64, name: &str) -> GateResult<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(GateError::invalid(format!(
            "{name} must be a non-negative number, got {seconds}"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Path to sound_gate.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("sound_gate.json")
}

/// Read sound_gate.json from the data directory. A missing file yields the
/// defaults; a malformed one is an error.
pub fn read_gate_config() -> GateResult<GateConfig> {
    let path = get_config_path();
    Ok(read_json_file(&path)?.unwrap_or_default())
}

/// Read and deserialize a JSON file, `None` if it does not exist.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> GateResult<Option<T>> {
    let load_err = |reason: String| GateError::Config {
        path: path.to_path_buf(),
        reason,
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| load_err(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(None)
        }
        Err(e) => Err(load_err(e.to_string())),
    }
}
