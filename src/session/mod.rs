//! Capture, train, predict and race orchestration.
//!
//! A [`Session`] owns every component for one driver. The host drives it by
//! calling [`Session::tick`] once per display refresh with the current time;
//! each tick drains training progress, fires due timers in deadline order and
//! runs one prediction pass. Nothing inside the session sleeps, so tests can
//! step time explicitly.

mod collector;
mod game;
mod lights;
mod prediction;
mod scheduler;
mod status;
mod trainer;
mod training_set;

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::camera::{CameraDevice, CameraStatus, DeviceError, FrameSink, FrameSource};
use crate::config::{AppConfig, TrainingSettings};
use crate::features::{FeatureExtractor, ThumbnailExtractor};
use crate::label::Label;
use crate::ml::mlp::{MlpClassifier, MlpOptions};
use crate::ml::{Classifier, FitConfig};

use scheduler::{Scheduler, TimerEvent, TimerGroup};

pub use collector::{CaptureError, CaptureSlot, SLOT_COUNT, SampleOutcome, TrainingDataCollector};
pub use game::{GameState, GameTimer, RoundOutcome};
pub use lights::{LIGHT_COUNT, LIGHT_SPAN, LightSequencer, LightTiming};
pub use prediction::PredictionLoop;
pub use status::{StatusInputs, StatusSnapshot, SystemState};
pub use trainer::{ClassifierState, ClassifierTrainer, TrainerEvent, TrainingError};
pub use training_set::{TrainingCounts, TrainingSet};

/// Something observable that happened during a tick.
#[derive(Debug, PartialEq)]
pub enum SessionEvent {
    SampleCaptured { label: Label, total: u64 },
    CaptureFailed(CaptureError),
    Light { light: usize, on: bool },
    /// The last light went out and the round accepts a reaction.
    Ready,
    Training(TrainerEvent),
    RoundFinished(RoundOutcome),
}

/// One driver's trainer session.
pub struct Session {
    config: AppConfig,
    frames: FrameSource,
    extractor: Option<Box<dyn FeatureExtractor>>,
    training_set: TrainingSet,
    collector: TrainingDataCollector,
    trainer: ClassifierTrainer,
    prediction: PredictionLoop,
    lights: LightSequencer,
    game: GameTimer,
    scheduler: Scheduler,
    model_failed: bool,
}

impl Session {
    /// Session without collaborators; install an extractor and classifier
    /// before training.
    pub fn new(config: AppConfig, device: Box<dyn CameraDevice>) -> Self {
        let config = config.normalized();
        Self {
            frames: FrameSource::new(device),
            extractor: None,
            training_set: TrainingSet::new(),
            collector: TrainingDataCollector::new(&config.capture),
            trainer: ClassifierTrainer::new(fit_config(&config.training), config.training.seed),
            prediction: PredictionLoop::new(),
            lights: LightSequencer::new(),
            game: GameTimer::new(Duration::from_millis(config.timer.sample_interval_ms)),
            scheduler: Scheduler::new(),
            model_failed: false,
            config,
        }
    }

    /// Session with the bundled thumbnail extractor and MLP classifier.
    pub fn with_default_models(config: AppConfig, device: Box<dyn CameraDevice>) -> Self {
        let mut session = Self::new(config, device);
        let extractor = ThumbnailExtractor::new(&session.config.features).load();
        session.install_extractor(Box::new(extractor));
        let classifier = MlpClassifier::new(mlp_options(&session.config.training));
        session.install_classifier(Box::new(classifier));
        session
    }

    pub fn install_extractor(&mut self, extractor: Box<dyn FeatureExtractor>) {
        debug!(
            "Feature extractor installed ({} features, ready: {})",
            extractor.feature_len(),
            extractor.is_ready()
        );
        self.extractor = Some(extractor);
    }

    pub fn install_classifier(&mut self, classifier: Box<dyn Classifier>) {
        self.trainer.install(classifier);
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Open the camera stream. Failure is terminal for the session.
    pub fn acquire_camera(&mut self) -> Result<(), DeviceError> {
        let result = self.frames.acquire();
        if result.is_err() {
            self.prediction.disarm();
        }
        result
    }

    /// Sink the camera device publishes into.
    pub fn frame_sink(&self) -> FrameSink {
        self.frames.sink()
    }

    /// Start a burst for `label` using the configured size and spacing.
    pub fn start_capture(&mut self, label: Label, now: Instant) {
        info!("Capture burst requested for {label}");
        self.collector
            .schedule_default_burst(label, now, &mut self.scheduler);
    }

    /// Start a burst of `burst_size` samples spaced `inter_frame_delay_ms`
    /// apart; the first sample fires at `now`.
    pub fn capture(
        &mut self,
        label: Label,
        burst_size: usize,
        inter_frame_delay_ms: u64,
        now: Instant,
    ) {
        info!("Capture burst of {burst_size} requested for {label}");
        self.collector.schedule_burst(
            label,
            burst_size,
            Duration::from_millis(inter_frame_delay_ms),
            now,
            &mut self.scheduler,
        );
    }

    pub fn detach_slot(&mut self, label: Label) {
        self.collector.detach(label);
    }

    pub fn attach_slot(&mut self, label: Label) {
        self.collector.attach(label);
    }

    pub fn slot(&self, label: Label) -> &CaptureSlot {
        self.collector.slot(label)
    }

    /// Fit a fresh classifier on the current training set in the background.
    ///
    /// Any rejection, `AlreadyTraining` included, leaves the model status at
    /// ERROR for the rest of the session, even if a running fit later lands.
    pub fn train(&mut self) -> Result<(), TrainingError> {
        let result = self.trainer.train(&mut self.training_set);
        if let Err(err) = &result {
            error!("Train request rejected: {err}");
            self.model_failed = true;
        }
        result
    }

    /// Block until the running fit resolves, applying its outcome.
    pub fn wait_for_training(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for event in self.trainer.wait(timeout) {
            self.apply_trainer_event(event, &mut events);
        }
        events
    }

    /// Start a round with the configured light timing.
    pub fn start_round(&mut self, now: Instant) -> u64 {
        let timing = LightTiming::from_settings(&self.config.lights);
        self.start_round_with(now, &timing)
    }

    /// Start a round with explicit light timing. A round already in progress
    /// is abandoned.
    pub fn start_round_with(&mut self, now: Instant, timing: &LightTiming) -> u64 {
        if self.config.lights.cancel_on_restart {
            let cancelled = self.scheduler.cancel(TimerGroup::Lights);
            if cancelled > 0 {
                debug!("Cancelled {cancelled} light timers from the previous sequence");
            }
        }
        self.scheduler.cancel(TimerGroup::GameTimer);
        self.game.start_round();
        self.lights.start(now, timing, &mut self.scheduler)
    }

    pub fn set_prediction_enabled(&mut self, enabled: bool) {
        self.prediction.set_enabled(enabled);
    }

    /// Advance the session to `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for event in self.trainer.poll() {
            self.apply_trainer_event(event, &mut events);
        }
        while let Some((at, timer)) = self.scheduler.pop_due(now) {
            self.dispatch(at, timer, &mut events);
        }
        if self.frames.status() == CameraStatus::Error {
            self.prediction.disarm();
        }
        let frame = self.frames.current_frame();
        let signal = self.prediction.run_pass(
            frame.as_ref(),
            self.extractor.as_deref(),
            self.trainer.classifier(),
        );
        if let Some(signal) = signal
            && let Some(outcome) = self.game.on_signal(signal, now)
        {
            self.scheduler.cancel(TimerGroup::GameTimer);
            events.push(SessionEvent::RoundFinished(outcome));
        }
        events
    }

    /// Earliest pending timer, for hosts that sleep between ticks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn status(&self) -> StatusSnapshot {
        let last_epoch = self.trainer.last_epoch();
        status::report(&StatusInputs {
            camera: self.frames.status(),
            extractor_ready: self
                .extractor
                .as_ref()
                .is_some_and(|extractor| extractor.is_ready()),
            classifier_present: self.trainer.has_classifier(),
            classifier_state: self.trainer.state(),
            model_failed: self.model_failed,
            counts: self.training_set.counts(),
            last_epoch: last_epoch.map(|report| report.epoch),
            last_metrics: last_epoch.map(|report| report.metrics),
            game: self.game.state(),
            control_signal: self.prediction.signal(),
            signal_confidence: self
                .prediction
                .signal()
                .zip(self.prediction.distribution())
                .map(|(signal, distribution)| distribution.probability(signal)),
            lights: self.lights.lights(),
        })
    }

    pub fn training_set(&self) -> &TrainingSet {
        &self.training_set
    }

    pub fn classifier_state(&self) -> ClassifierState {
        self.trainer.state()
    }

    pub fn game_state(&self) -> GameState {
        self.game.state()
    }

    pub fn lights(&self) -> [bool; LIGHT_COUNT] {
        self.lights.lights()
    }

    pub fn ready_at(&self) -> Option<Instant> {
        self.lights.ready_at()
    }

    pub fn control_signal(&self) -> Option<Label> {
        self.prediction.signal()
    }

    pub fn prediction(&self) -> &PredictionLoop {
        &self.prediction
    }

    /// Cancel all timers, stop predicting, discard any running fit and
    /// release the camera.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.prediction.set_enabled(false);
        self.trainer.shutdown();
        self.frames.release();
        self.lights.reset();
        self.game.reset();
        info!("Session shut down");
    }

    fn apply_trainer_event(&mut self, event: TrainerEvent, events: &mut Vec<SessionEvent>) {
        match &event {
            TrainerEvent::Completed { .. } => self.prediction.set_enabled(true),
            TrainerEvent::Failed(_) => self.model_failed = true,
            TrainerEvent::Epoch(_) => {}
        }
        events.push(SessionEvent::Training(event));
    }

    fn dispatch(&mut self, at: Instant, timer: TimerEvent, events: &mut Vec<SessionEvent>) {
        match timer {
            TimerEvent::CaptureSample { label, sample } => {
                let frame = self.frames.current_frame();
                match self.collector.capture_sample(
                    label,
                    frame.as_ref(),
                    self.extractor.as_deref(),
                    &mut self.training_set,
                ) {
                    Ok(SampleOutcome::Appended) => events.push(SessionEvent::SampleCaptured {
                        label,
                        total: self.training_set.counts().get(label),
                    }),
                    Ok(SampleOutcome::NotLive) => {
                        debug!("{label} sample {sample} skipped, stream not live");
                    }
                    Ok(SampleOutcome::Skipped) => {}
                    Err(err) => {
                        warn!("{label} sample {sample} failed: {err}");
                        self.frames.mark_error();
                        self.prediction.disarm();
                        events.push(SessionEvent::CaptureFailed(err));
                    }
                }
            }
            TimerEvent::Light {
                generation,
                light,
                on,
            } => {
                self.lights.set_light(generation, light, on);
                events.push(SessionEvent::Light { light, on });
            }
            TimerEvent::Ready { generation } => {
                if self.lights.mark_ready(generation, at) {
                    events.push(SessionEvent::Ready);
                    if self.game.on_ready(at) {
                        self.scheduler.schedule_after(
                            at,
                            self.game.sample_interval(),
                            TimerEvent::TimerSample,
                        );
                    }
                }
            }
            TimerEvent::TimerSample => {
                if self.game.on_sample(at) {
                    self.scheduler.schedule_after(
                        at,
                        self.game.sample_interval(),
                        TimerEvent::TimerSample,
                    );
                }
            }
        }
    }
}

fn fit_config(settings: &TrainingSettings) -> FitConfig {
    FitConfig {
        batch_size: settings.batch_size,
        epochs: settings.epochs,
        shuffle: settings.shuffle,
    }
}

fn mlp_options(settings: &TrainingSettings) -> MlpOptions {
    MlpOptions {
        hidden_size: settings.hidden_size,
        learning_rate: settings.learning_rate,
        seed: settings.seed,
        ..MlpOptions::default()
    }
}
