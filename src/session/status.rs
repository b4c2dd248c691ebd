//! Read-only status view derived from the session components.

use serde::Serialize;

use super::game::GameState;
use super::lights::LIGHT_COUNT;
use super::trainer::ClassifierState;
use super::training_set::TrainingCounts;
use crate::camera::CameraStatus;
use crate::label::Label;
use crate::ml::EpochMetrics;

/// Coarse system state shown to the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Loading,
    DriverCameraReady,
    AddTrainingData,
    TrainModel,
    Error,
}

/// Everything the status view is computed from.
#[derive(Clone, Copy, Debug)]
pub struct StatusInputs {
    pub camera: CameraStatus,
    pub extractor_ready: bool,
    pub classifier_present: bool,
    pub classifier_state: ClassifierState,
    pub model_failed: bool,
    pub counts: TrainingCounts,
    pub last_epoch: Option<usize>,
    pub last_metrics: Option<EpochMetrics>,
    pub game: GameState,
    pub control_signal: Option<Label>,
    /// Probability the classifier gave the current control signal.
    pub signal_confidence: Option<f32>,
    pub lights: [bool; LIGHT_COUNT],
}

/// Serializable snapshot for the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub camera_status: SystemState,
    pub model_status: SystemState,
    pub classifier_state: ClassifierState,
    pub training_counts: TrainingCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_epoch: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_metrics: Option<EpochMetrics>,
    pub game_state: GameState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_signal: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_confidence: Option<f32>,
    pub lights: [bool; LIGHT_COUNT],
}

impl StatusSnapshot {
    /// Single state combining camera and model; errors win.
    pub fn overall(&self) -> SystemState {
        if self.camera_status == SystemState::Error || self.model_status == SystemState::Error {
            SystemState::Error
        } else if self.camera_status != SystemState::DriverCameraReady {
            self.camera_status
        } else {
            self.model_status
        }
    }
}

pub fn camera_state(camera: CameraStatus) -> SystemState {
    match camera {
        CameraStatus::Loading => SystemState::Loading,
        CameraStatus::Ready => SystemState::DriverCameraReady,
        CameraStatus::Error => SystemState::Error,
    }
}

pub fn model_state(inputs: &StatusInputs) -> SystemState {
    if inputs.model_failed {
        return SystemState::Error;
    }
    if !inputs.extractor_ready
        || !inputs.classifier_present
        || inputs.camera != CameraStatus::Ready
    {
        return SystemState::Loading;
    }
    if inputs.counts.is_complete() {
        SystemState::TrainModel
    } else {
        SystemState::AddTrainingData
    }
}

/// Derive the snapshot. Epoch progress is only shown while training is
/// possible.
pub fn report(inputs: &StatusInputs) -> StatusSnapshot {
    let model_status = model_state(inputs);
    let show_progress = model_status == SystemState::TrainModel;
    StatusSnapshot {
        camera_status: camera_state(inputs.camera),
        model_status,
        classifier_state: inputs.classifier_state,
        training_counts: inputs.counts,
        current_epoch: inputs.last_epoch.filter(|_| show_progress),
        current_metrics: inputs.last_metrics.filter(|_| show_progress),
        game_state: inputs.game,
        elapsed_ms: inputs.game.elapsed_ms(),
        control_signal: inputs.control_signal,
        signal_confidence: inputs.signal_confidence,
        lights: inputs.lights,
    }
}
