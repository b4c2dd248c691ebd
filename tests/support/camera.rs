use std::sync::{Arc, Mutex};

use lightsout::camera::{CameraDevice, DeviceError, FrameSink, StreamHandle, SyntheticCamera};
use lightsout::label::Label;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Camera whose frames are pushed by the test on demand.
pub struct ScriptedCamera {
    sink: Arc<Mutex<Option<FrameSink>>>,
    fail: Option<fn() -> DeviceError>,
}

/// Test-side handle for publishing frames into a [`ScriptedCamera`].
#[derive(Clone)]
pub struct CameraHandle {
    sink: Arc<Mutex<Option<FrameSink>>>,
    rng: Arc<Mutex<StdRng>>,
}

impl ScriptedCamera {
    pub fn new() -> (Self, CameraHandle) {
        let sink = Arc::new(Mutex::new(None));
        let handle = CameraHandle {
            sink: sink.clone(),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(42))),
        };
        (Self { sink, fail: None }, handle)
    }

    pub fn denied() -> Self {
        Self {
            sink: Arc::new(Mutex::new(None)),
            fail: Some(|| DeviceError::PermissionDenied),
        }
    }
}

impl CameraDevice for ScriptedCamera {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&mut self, sink: FrameSink) -> Result<StreamHandle, DeviceError> {
        if let Some(fail) = self.fail {
            return Err(fail());
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(StreamHandle::detached())
    }
}

impl CameraHandle {
    /// Publish one synthetic frame showing `gesture`.
    pub fn show(&self, gesture: Label) {
        let image = {
            let mut rng = self.rng.lock().unwrap();
            SyntheticCamera::render(32, 24, gesture, &mut *rng)
        };
        self.sink
            .lock()
            .unwrap()
            .as_ref()
            .expect("camera not acquired")
            .publish(image);
    }
}
