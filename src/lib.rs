//! Library exports for the reaction trainer, its demo binary, tests and benches.
/// Application directories.
pub mod app_dirs;
/// Live video input and the synthetic test camera.
pub mod camera;
/// Persisted settings.
pub mod config;
/// Frame to feature-vector extraction.
pub mod features;
/// HOLD/GO label space.
pub mod label;
/// Logging setup and log retention.
pub mod logging;
/// Gesture classifier and training metrics.
pub mod ml;
/// Capture, training, prediction and race orchestration.
pub mod session;
