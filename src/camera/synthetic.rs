use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use image::{Rgb, RgbImage};
use rand::Rng;
use tracing::debug;

use super::{CameraDevice, DeviceError, FrameSink, StreamHandle};
use crate::config::CameraSettings;
use crate::label::Label;

const NOISE_AMPLITUDE: i16 = 12;

/// Remote control for the gesture a [`SyntheticCamera`] is showing.
#[derive(Clone, Debug)]
pub struct GestureControl {
    current: Arc<AtomicU8>,
}

impl GestureControl {
    fn new(initial: Label) -> Self {
        Self {
            current: Arc::new(AtomicU8::new(initial.index() as u8)),
        }
    }

    pub fn set(&self, gesture: Label) {
        self.current.store(gesture.index() as u8, Ordering::Relaxed);
    }

    pub fn get(&self) -> Label {
        Label::from_index(self.current.load(Ordering::Relaxed) as usize).unwrap_or(Label::Hold)
    }
}

/// Test-pattern camera: a bright panel on the left for HOLD, on the right for
/// GO, with per-pixel noise. Frames are produced on a background thread.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    gesture: GestureControl,
}

impl SyntheticCamera {
    pub fn new(settings: &CameraSettings) -> Self {
        Self {
            width: settings.width.max(2),
            height: settings.height.max(1),
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(settings.fps.max(1))),
            gesture: GestureControl::new(Label::Hold),
        }
    }

    pub fn gesture(&self) -> GestureControl {
        self.gesture.clone()
    }

    /// Render one frame for `gesture`.
    pub fn render(width: u32, height: u32, gesture: Label, rng: &mut impl Rng) -> RgbImage {
        let split = width / 2;
        RgbImage::from_fn(width, height, |x, _y| {
            let lit = match gesture {
                Label::Hold => x < split,
                Label::Go => x >= split,
            };
            let base: i16 = if lit { 220 } else { 30 };
            let noise = rng.random_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE);
            let value = (base + noise).clamp(0, 255) as u8;
            Rgb([value, value / 2, value / 3])
        })
    }
}

impl CameraDevice for SyntheticCamera {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&mut self, sink: FrameSink) -> Result<StreamHandle, DeviceError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let gesture = self.gesture.clone();
        let (width, height, interval) = (self.width, self.height, self.frame_interval);
        let join = thread::Builder::new()
            .name("synthetic-camera".into())
            .spawn(move || {
                let mut rng = rand::rng();
                while !thread_stop.load(Ordering::Relaxed) {
                    sink.publish(Self::render(width, height, gesture.get(), &mut rng));
                    thread::sleep(interval);
                }
                debug!("Synthetic camera stopped");
            })
            .map_err(|err| DeviceError::StreamFailed {
                detail: err.to_string(),
            })?;
        Ok(StreamHandle::new(stop, join))
    }
}
