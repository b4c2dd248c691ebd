//! Background classifier fitting.
//!
//! A train call snapshots the shuffled training set into a [`TrainingBatch`],
//! fits a fresh classifier on a worker thread and streams epoch reports back
//! over a channel. The session drains those messages on every tick; the
//! previous classifier keeps serving predictions until the new fit lands.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::training_set::TrainingSet;
use crate::ml::{Classifier, EpochReport, FitConfig, FitError, TrainingBatch};

/// Lifecycle of the session classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassifierState {
    Uninitialized,
    Training,
    Ready,
}

/// Reasons a train call is rejected or a fit fails.
#[derive(Debug, Error, PartialEq)]
pub enum TrainingError {
    /// No classifier has been installed.
    #[error("No classifier is available to train")]
    ClassifierMissing,
    /// Nothing has been captured yet.
    #[error("Training set is empty")]
    EmptyTrainingSet,
    /// A fit is already running.
    #[error("Training is already in progress")]
    AlreadyTraining,
    /// The classifier rejected the batch or diverged.
    #[error("Fit rejected: {0}")]
    Fit(#[from] FitError),
    /// The worker thread could not start or exited without reporting.
    #[error("Training worker failed: {detail}")]
    Worker { detail: String },
}

/// Progress surfaced to the session.
#[derive(Debug, PartialEq)]
pub enum TrainerEvent {
    Epoch(EpochReport),
    Completed { examples: usize },
    Failed(TrainingError),
}

enum TrainerMessage {
    Epoch(EpochReport),
    Finished(Result<Box<dyn Classifier>, FitError>),
}

struct TrainJob {
    rx: Receiver<TrainerMessage>,
    handle: Option<JoinHandle<()>>,
    examples: usize,
    previous_state: ClassifierState,
    started_at: Instant,
}

/// Single-writer owner of the session classifier.
pub struct ClassifierTrainer {
    classifier: Option<Arc<dyn Classifier>>,
    state: ClassifierState,
    fit_config: FitConfig,
    rng: StdRng,
    job: Option<TrainJob>,
    last_epoch: Option<EpochReport>,
}

impl ClassifierTrainer {
    pub fn new(fit_config: FitConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            classifier: None,
            state: ClassifierState::Uninitialized,
            fit_config,
            rng,
            job: None,
            last_epoch: None,
        }
    }

    /// Install the classifier instance. An already fitted one is served
    /// immediately.
    pub fn install(&mut self, classifier: Box<dyn Classifier>) {
        info!("Classifier installed ({})", classifier.name());
        if classifier.is_fitted() && self.job.is_none() {
            self.state = ClassifierState::Ready;
        }
        self.classifier = Some(Arc::from(classifier));
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Classifier currently serving predictions.
    pub fn classifier(&self) -> Option<&dyn Classifier> {
        self.classifier.as_deref()
    }

    pub fn last_epoch(&self) -> Option<EpochReport> {
        self.last_epoch
    }

    pub fn is_training(&self) -> bool {
        self.job.is_some()
    }

    /// Shuffle `set`, snapshot it and start fitting a fresh classifier.
    /// A rejected call leaves the classifier state unchanged.
    pub fn train(&mut self, set: &mut TrainingSet) -> Result<(), TrainingError> {
        let Some(current) = self.classifier.as_ref() else {
            return Err(TrainingError::ClassifierMissing);
        };
        if self.job.is_some() {
            return Err(TrainingError::AlreadyTraining);
        }
        if set.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }
        set.shuffle(&mut self.rng);
        let batch = TrainingBatch::stack(set.features(), set.labels())?;
        let examples = batch.len();
        let mut fresh = current.untrained();
        let config = self.fit_config;
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("classifier-fit".into())
            .spawn(move || {
                let epoch_tx = tx.clone();
                let result = fresh.fit(&batch, &config, &mut |report| {
                    let _ = epoch_tx.send(TrainerMessage::Epoch(report));
                });
                drop(batch);
                let _ = tx.send(TrainerMessage::Finished(result.map(|()| fresh)));
            })
            .map_err(|err| TrainingError::Worker {
                detail: err.to_string(),
            })?;
        info!(
            "Training started on {examples} examples ({} epochs, batch size {})",
            config.epochs, config.batch_size
        );
        self.job = Some(TrainJob {
            rx,
            handle: Some(handle),
            examples,
            previous_state: self.state,
            started_at: Instant::now(),
        });
        self.last_epoch = None;
        self.state = ClassifierState::Training;
        Ok(())
    }

    /// Drain worker messages without blocking.
    pub fn poll(&mut self) -> Vec<TrainerEvent> {
        let mut events = Vec::new();
        loop {
            let Some(job) = self.job.as_ref() else {
                break;
            };
            match job.rx.try_recv() {
                Ok(message) => {
                    if let Some(event) = self.handle_message(message) {
                        events.push(event);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.push(self.worker_lost());
                    break;
                }
            }
        }
        events
    }

    /// Block until the in-flight fit resolves or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<TrainerEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while let Some(job) = self.job.as_ref() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match job.rx.recv_timeout(remaining) {
                Ok(message) => {
                    if let Some(event) = self.handle_message(message) {
                        events.push(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Timed out waiting for training to finish");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    events.push(self.worker_lost());
                    break;
                }
            }
        }
        events
    }

    /// Wait for any running fit and discard its result.
    pub fn shutdown(&mut self) {
        if let Some(mut job) = self.job.take() {
            if let Some(handle) = job.handle.take()
                && handle.join().is_err()
            {
                warn!("Training worker panicked during shutdown");
            }
            self.state = job.previous_state;
            debug!("Discarded in-flight training on shutdown");
        }
    }

    fn handle_message(&mut self, message: TrainerMessage) -> Option<TrainerEvent> {
        match message {
            TrainerMessage::Epoch(report) => {
                debug!(
                    "Epoch {}: loss {:.4}, accuracy {:.3}",
                    report.epoch, report.metrics.loss, report.metrics.accuracy
                );
                self.last_epoch = Some(report);
                Some(TrainerEvent::Epoch(report))
            }
            TrainerMessage::Finished(result) => {
                let mut job = self.job.take()?;
                if let Some(handle) = job.handle.take()
                    && handle.join().is_err()
                {
                    warn!("Training worker panicked after reporting");
                }
                match result {
                    Ok(classifier) => {
                        self.classifier = Some(Arc::from(classifier));
                        self.state = ClassifierState::Ready;
                        info!(
                            "Training finished on {} examples in {:.2?}",
                            job.examples,
                            job.started_at.elapsed()
                        );
                        Some(TrainerEvent::Completed {
                            examples: job.examples,
                        })
                    }
                    Err(err) => {
                        self.state = job.previous_state;
                        error!("Training failed: {err}");
                        Some(TrainerEvent::Failed(TrainingError::Fit(err)))
                    }
                }
            }
        }
    }

    fn worker_lost(&mut self) -> TrainerEvent {
        if let Some(job) = self.job.take() {
            self.state = job.previous_state;
        }
        error!("Training worker exited without a result");
        TrainerEvent::Failed(TrainingError::Worker {
            detail: "worker exited without a result".to_string(),
        })
    }
}

impl Drop for ClassifierTrainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
