//! Burst capture of labeled training examples.
//!
//! Each label owns one capture slot. A slot keeps the thumbnail of its most
//! recent sample and can be detached by the presentation layer, after which
//! captures into it fail.

use std::time::{Duration, Instant};

use image::RgbImage;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::{debug, warn};

use super::scheduler::{Scheduler, TimerEvent};
use super::training_set::TrainingSet;
use crate::camera::Frame;
use crate::config::CaptureSettings;
use crate::features::FeatureExtractor;
use crate::label::{CLASS_COUNT, Label};

/// Number of capture slots, one per label.
pub const SLOT_COUNT: usize = CLASS_COUNT;

/// Failures that make a scheduled sample unrecoverable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The slot for this label is not attached.
    #[error("Capture slot {slot} for {label} is unavailable")]
    SlotUnavailable { slot: usize, label: Label },
}

/// What happened to one scheduled sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Appended,
    /// No frame yet; nothing captured.
    NotLive,
    /// Extraction failed or the extractor is not ready; sample dropped.
    Skipped,
}

/// One capture target.
#[derive(Debug, Clone)]
pub struct CaptureSlot {
    label: Label,
    attached: bool,
    snapshot: Option<RgbImage>,
    captured: u64,
}

impl CaptureSlot {
    fn new(label: Label) -> Self {
        Self {
            label,
            attached: true,
            snapshot: None,
            captured: 0,
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Thumbnail of the latest sample.
    pub fn snapshot(&self) -> Option<&RgbImage> {
        self.snapshot.as_ref()
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }
}

/// Schedules bursts and turns each due sample into a training example.
#[derive(Debug)]
pub struct TrainingDataCollector {
    burst_size: usize,
    inter_frame_delay: Duration,
    snapshot_size: (u32, u32),
    slots: [CaptureSlot; SLOT_COUNT],
}

impl TrainingDataCollector {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            burst_size: settings.burst_size,
            inter_frame_delay: Duration::from_millis(settings.inter_frame_delay_ms),
            snapshot_size: (settings.slot_width.max(1), settings.slot_height.max(1)),
            slots: Label::ALL.map(CaptureSlot::new),
        }
    }

    pub fn slots(&self) -> &[CaptureSlot; SLOT_COUNT] {
        &self.slots
    }

    pub fn slot(&self, label: Label) -> &CaptureSlot {
        &self.slots[label.index()]
    }

    pub fn detach(&mut self, label: Label) {
        self.slots[label.index()].attached = false;
    }

    pub fn attach(&mut self, label: Label) {
        self.slots[label.index()].attached = true;
    }

    /// Schedule a burst with the configured size and spacing.
    pub(crate) fn schedule_default_burst(
        &self,
        label: Label,
        now: Instant,
        scheduler: &mut Scheduler,
    ) {
        self.schedule_burst(label, self.burst_size, self.inter_frame_delay, now, scheduler);
    }

    /// Sample `i` fires `i * inter_frame_delay` after `now`.
    pub(crate) fn schedule_burst(
        &self,
        label: Label,
        burst_size: usize,
        inter_frame_delay: Duration,
        now: Instant,
        scheduler: &mut Scheduler,
    ) {
        for sample in 0..burst_size {
            scheduler.schedule_after(
                now,
                inter_frame_delay * sample as u32,
                TimerEvent::CaptureSample { label, sample },
            );
        }
        debug!("Scheduled {burst_size} {label} samples");
    }

    /// Capture one sample into the slot for `label`.
    pub fn capture_sample(
        &mut self,
        label: Label,
        frame: Option<&Frame>,
        extractor: Option<&dyn FeatureExtractor>,
        set: &mut TrainingSet,
    ) -> Result<SampleOutcome, CaptureError> {
        let slot_idx = label.index();
        if !self.slots[slot_idx].attached {
            return Err(CaptureError::SlotUnavailable {
                slot: slot_idx,
                label,
            });
        }
        let Some(frame) = frame else {
            return Ok(SampleOutcome::NotLive);
        };
        let Some(extractor) = extractor else {
            warn!("No feature extractor installed, {label} sample dropped");
            return Ok(SampleOutcome::Skipped);
        };
        let features = match extractor.extract(frame) {
            Ok(features) => features,
            Err(err) => {
                warn!("{label} sample dropped: {err}");
                return Ok(SampleOutcome::Skipped);
            }
        };
        let (width, height) = self.snapshot_size;
        let slot = &mut self.slots[slot_idx];
        slot.snapshot = Some(image::imageops::resize(
            frame.image(),
            width,
            height,
            FilterType::Triangle,
        ));
        slot.captured += 1;
        set.push(features, label);
        debug!("Captured {label} sample ({} total)", set.counts().get(label));
        Ok(SampleOutcome::Appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FrameSink;
    use crate::config::FeatureSettings;
    use crate::features::ThumbnailExtractor;

    fn frame() -> Frame {
        let sink = FrameSink::new();
        sink.publish(RgbImage::new(8, 8));
        sink.latest().unwrap()
    }

    fn collector() -> TrainingDataCollector {
        TrainingDataCollector::new(&CaptureSettings {
            burst_size: 3,
            inter_frame_delay_ms: 150,
            slot_width: 4,
            slot_height: 4,
        })
    }

    #[test]
    fn burst_samples_are_spaced_by_delay() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::new();
        collector().schedule_default_burst(Label::Go, t0, &mut scheduler);
        let mut deadlines = Vec::new();
        while let Some((at, event)) = scheduler.pop_due(t0 + Duration::from_secs(1)) {
            assert!(matches!(event, TimerEvent::CaptureSample { label: Label::Go, .. }));
            deadlines.push(at - t0);
        }
        assert_eq!(
            deadlines,
            vec![
                Duration::ZERO,
                Duration::from_millis(150),
                Duration::from_millis(300)
            ]
        );
    }

    #[test]
    fn appends_and_snapshots_into_label_slot() {
        let extractor = ThumbnailExtractor::new(&FeatureSettings::default()).load();
        let mut collector = collector();
        let mut set = TrainingSet::new();
        let outcome = collector
            .capture_sample(Label::Hold, Some(&frame()), Some(&extractor), &mut set)
            .unwrap();
        assert_eq!(outcome, SampleOutcome::Appended);
        assert_eq!(set.counts().hold, 1);
        let slot = collector.slot(Label::Hold);
        assert_eq!(slot.captured(), 1);
        assert_eq!(slot.snapshot().map(|s| s.dimensions()), Some((4, 4)));
        assert!(collector.slot(Label::Go).snapshot().is_none());
    }

    #[test]
    fn missing_frame_or_extractor_leaves_set_untouched() {
        let mut collector = collector();
        let mut set = TrainingSet::new();
        let unloaded = ThumbnailExtractor::new(&FeatureSettings::default());
        assert_eq!(
            collector.capture_sample(Label::Go, None, Some(&unloaded), &mut set),
            Ok(SampleOutcome::NotLive)
        );
        assert_eq!(
            collector.capture_sample(Label::Go, Some(&frame()), Some(&unloaded), &mut set),
            Ok(SampleOutcome::Skipped)
        );
        assert!(set.is_empty());
    }

    #[test]
    fn detached_slot_fails_with_capture_error() {
        let extractor = ThumbnailExtractor::new(&FeatureSettings::default()).load();
        let mut collector = collector();
        let mut set = TrainingSet::new();
        collector.detach(Label::Go);
        assert_eq!(
            collector.capture_sample(Label::Go, Some(&frame()), Some(&extractor), &mut set),
            Err(CaptureError::SlotUnavailable {
                slot: 1,
                label: Label::Go
            })
        );
        assert!(set.is_empty());
        collector.attach(Label::Go);
        assert!(collector
            .capture_sample(Label::Go, Some(&frame()), Some(&extractor), &mut set)
            .is_ok());
    }
}
