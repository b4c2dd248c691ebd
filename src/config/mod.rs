//! Persisted trainer settings.
//!
//! Settings live in `config.toml` under the application root. Every field has a
//! serde default so partial or older files keep loading; values are clamped
//! into a usable range on load.

mod defaults;
mod io;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use defaults::*;

pub use io::{CONFIG_FILE_NAME, config_path, load_from, load_or_default, save, save_to};

/// Aggregate settings for one trainer session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub lights: LightSettings,
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default)]
    pub prediction: PredictionSettings,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Burst capture behaviour for the two capture slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Frames captured per user action.
    #[serde(default = "default_burst_size")]
    pub burst_size: usize,
    /// Delay between consecutive frames of a burst.
    #[serde(default = "default_inter_frame_delay_ms")]
    pub inter_frame_delay_ms: u64,
    /// Snapshot width kept per capture slot.
    #[serde(default = "default_slot_size")]
    pub slot_width: u32,
    /// Snapshot height kept per capture slot.
    #[serde(default = "default_slot_size")]
    pub slot_height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            burst_size: default_burst_size(),
            inter_frame_delay_ms: default_inter_frame_delay_ms(),
            slot_width: default_slot_size(),
            slot_height: default_slot_size(),
        }
    }
}

/// Fit schedule and head architecture for the gesture classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Reshuffle the batch order every epoch.
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Fixed seed for reproducible runs; a fresh seed is drawn when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            epochs: default_epochs(),
            shuffle: true,
            hidden_size: default_hidden_size(),
            learning_rate: default_learning_rate(),
            seed: None,
        }
    }
}

/// Start-light sequence timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    /// Delay before the first light of a sequence.
    #[serde(default)]
    pub base_delay_ms: u64,
    /// Offset between consecutive lights turning on.
    #[serde(default = "default_per_light_offset_ms")]
    pub per_light_offset_ms: u64,
    /// Hold after the last light goes out before the round is ready.
    #[serde(default = "default_hold_duration_secs")]
    pub hold_duration_secs: f32,
    /// Cancel the timers of a sequence still in flight when a new one starts.
    #[serde(default = "default_true")]
    pub cancel_on_restart: bool,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 0,
            per_light_offset_ms: default_per_light_offset_ms(),
            hold_duration_secs: default_hold_duration_secs(),
            cancel_on_restart: true,
        }
    }
}

impl LightSettings {
    pub fn hold_duration(&self) -> Duration {
        Duration::from_secs_f32(self.hold_duration_secs.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

/// Cadence used when no display drives the prediction loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSettings {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

/// Input size the feature extractor resizes frames to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    #[serde(default = "default_feature_input_size")]
    pub input_width: u32,
    #[serde(default = "default_feature_input_size")]
    pub input_height: u32,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            input_width: default_feature_input_size(),
            input_height: default_feature_input_size(),
        }
    }
}

/// Geometry and rate of the synthetic camera device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: default_camera_width(),
            height: default_camera_height(),
            fps: default_camera_fps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write a per-launch log file next to stdout output.
    #[serde(default = "default_true")]
    pub file_output: bool,
    /// Log files retained in the logs directory.
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: true,
            max_files: default_max_log_files(),
        }
    }
}

impl AppConfig {
    /// Clamp values into ranges the session can run with.
    pub fn normalized(mut self) -> Self {
        self.capture.burst_size = self.capture.burst_size.clamp(1, MAX_BURST_SIZE);
        self.capture.slot_width = self.capture.slot_width.max(1);
        self.capture.slot_height = self.capture.slot_height.max(1);
        self.training.batch_size = self.training.batch_size.max(1);
        self.training.epochs = self.training.epochs.max(1);
        self.training.hidden_size = self.training.hidden_size.max(1);
        if !self.training.learning_rate.is_finite() || self.training.learning_rate <= 0.0 {
            self.training.learning_rate = default_learning_rate();
        }
        if !self.lights.hold_duration_secs.is_finite() || self.lights.hold_duration_secs < 0.0 {
            self.lights.hold_duration_secs = 0.0;
        }
        self.timer.sample_interval_ms = self.timer.sample_interval_ms.max(1);
        self.prediction.refresh_interval_ms = self.prediction.refresh_interval_ms.max(1);
        self.features.input_width = self.features.input_width.max(1);
        self.features.input_height = self.features.input_height.max(1);
        self.camera.width = self.camera.width.max(1);
        self.camera.height = self.camera.height.max(1);
        self.camera.fps = self.camera.fps.max(1);
        self.logging.max_files = self.logging.max_files.max(1);
        self
    }
}

/// Errors that may occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to create the config directory.
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read the config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`AppConfig`].
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
}
