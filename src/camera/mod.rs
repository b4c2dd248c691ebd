//! Live video input.
//!
//! A [`CameraDevice`] streams frames into a [`FrameSink`]; the [`FrameSource`]
//! owns the stream for the session and hands out the latest frame on demand.
//! Only the most recent frame is kept.

mod synthetic;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use synthetic::{GestureControl, SyntheticCamera};

/// Errors raised at the camera device boundary.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The user or platform refused camera access.
    #[error("Camera permission denied")]
    PermissionDenied,
    /// No camera hardware is available.
    #[error("No camera device found")]
    NotFound,
    /// The device was found but the stream could not start.
    #[error("Failed to start camera stream: {detail}")]
    StreamFailed { detail: String },
}

/// One sampled image from the live stream.
#[derive(Clone, Debug)]
pub struct Frame {
    id: u64,
    captured_at: Instant,
    image: Arc<RgbImage>,
}

impl Frame {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Shared slot a device writes frames into.
#[derive(Clone, Default)]
pub struct FrameSink {
    latest: Arc<Mutex<Option<Frame>>>,
    next_id: Arc<AtomicU64>,
}

impl FrameSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame with `image`.
    pub fn publish(&self, image: RgbImage) {
        let frame = Frame {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            captured_at: Instant::now(),
            image: Arc::new(image),
        };
        match self.latest.lock() {
            Ok(mut guard) => *guard = Some(frame),
            Err(poisoned) => *poisoned.into_inner() = Some(frame),
        }
    }

    pub(crate) fn latest(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = None;
        }
    }
}

/// Running device stream; stops its producer thread when dropped.
pub struct StreamHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn new(stop: Arc<AtomicBool>, join: JoinHandle<()>) -> Self {
        Self {
            stop,
            join: Some(join),
        }
    }

    /// Handle for devices that publish from the caller's thread.
    pub fn detached() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            join: None,
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            warn!("Camera producer thread panicked");
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hardware (or simulated) camera that can stream frames into a sink.
pub trait CameraDevice: Send {
    fn name(&self) -> &str;

    /// Start streaming into `sink`.
    fn open(&mut self, sink: FrameSink) -> Result<StreamHandle, DeviceError>;
}

/// Camera readiness as reported to the status view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// Stream requested or not yet producing frames.
    Loading,
    /// Frames are flowing.
    Ready,
    /// Device failure or capture misconfiguration; terminal for the session.
    Error,
}

/// Owner of the live stream for a session.
pub struct FrameSource {
    device: Box<dyn CameraDevice>,
    sink: FrameSink,
    stream: Option<StreamHandle>,
    failed: bool,
}

impl FrameSource {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            sink: FrameSink::new(),
            stream: None,
            failed: false,
        }
    }

    /// Open the device stream. A failure marks the camera as errored.
    pub fn acquire(&mut self) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Ok(());
        }
        match self.device.open(self.sink.clone()) {
            Ok(stream) => {
                info!("Camera stream acquired from {}", self.device.name());
                self.stream = Some(stream);
                Ok(())
            }
            Err(err) => {
                warn!("Camera {} unavailable: {err}", self.device.name());
                self.failed = true;
                Err(err)
            }
        }
    }

    /// Latest frame, or `None` before the stream is live.
    pub fn current_frame(&self) -> Option<Frame> {
        if self.failed || self.stream.is_none() {
            return None;
        }
        self.sink.latest()
    }

    pub fn is_live(&self) -> bool {
        self.current_frame().is_some()
    }

    pub fn status(&self) -> CameraStatus {
        if self.failed {
            CameraStatus::Error
        } else if self.is_live() {
            CameraStatus::Ready
        } else {
            CameraStatus::Loading
        }
    }

    /// Flag a structural capture failure; the camera stays errored.
    pub fn mark_error(&mut self) {
        if !self.failed {
            warn!("Camera marked as errored");
        }
        self.failed = true;
    }

    /// Stop the device stream and drop the last frame.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("Camera stream released");
        }
        self.sink.clear();
    }

    /// Sink the current device publishes into.
    pub fn sink(&self) -> FrameSink {
        self.sink.clone()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PushCamera {
        fail: Option<fn() -> DeviceError>,
        sink: Arc<Mutex<Option<FrameSink>>>,
    }

    impl CameraDevice for PushCamera {
        fn name(&self) -> &str {
            "push"
        }

        fn open(&mut self, sink: FrameSink) -> Result<StreamHandle, DeviceError> {
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            *self.sink.lock().unwrap() = Some(sink);
            Ok(StreamHandle::detached())
        }
    }

    #[test]
    fn status_tracks_stream_lifecycle() {
        let slot = Arc::new(Mutex::new(None));
        let mut source = FrameSource::new(Box::new(PushCamera {
            fail: None,
            sink: slot.clone(),
        }));
        assert_eq!(source.status(), CameraStatus::Loading);
        assert!(source.current_frame().is_none());

        source.acquire().unwrap();
        assert_eq!(source.status(), CameraStatus::Loading);

        let sink = slot.lock().unwrap().clone().unwrap();
        sink.publish(RgbImage::new(4, 3));
        sink.publish(RgbImage::new(4, 3));
        let frame = source.current_frame().unwrap();
        assert_eq!(frame.id(), 1);
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(source.status(), CameraStatus::Ready);

        source.release();
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn device_failure_is_terminal() {
        let mut source = FrameSource::new(Box::new(PushCamera {
            fail: Some(|| DeviceError::PermissionDenied),
            sink: Arc::new(Mutex::new(None)),
        }));
        assert!(matches!(source.acquire(), Err(DeviceError::PermissionDenied)));
        assert_eq!(source.status(), CameraStatus::Error);
        assert!(source.current_frame().is_none());
    }
}
