//! Five-light start sequence.
//!
//! Light `i` turns on at `base + i * offset`, turns off
//! `LIGHT_SPAN - offset` later (saturating at zero), and the round becomes
//! ready `hold` after the last light goes out.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::scheduler::{Scheduler, TimerEvent};
use crate::config::LightSettings;

pub const LIGHT_COUNT: usize = 5;
/// Time from the first light to the moment every light has been lit.
pub const LIGHT_SPAN: Duration = Duration::from_millis(5_000);

/// Offsets of one sequence, relative to its start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightTiming {
    pub base_delay: Duration,
    pub per_light_offset: Duration,
    pub hold: Duration,
}

impl LightTiming {
    pub fn new(base_delay_ms: u64, per_light_offset_ms: u64, hold_duration_secs: f32) -> Self {
        Self {
            base_delay: Duration::from_millis(base_delay_ms),
            per_light_offset: Duration::from_millis(per_light_offset_ms),
            hold: Duration::from_secs_f32(hold_duration_secs.max(0.0)),
        }
    }

    pub fn from_settings(settings: &LightSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.base_delay_ms),
            per_light_offset: Duration::from_millis(settings.per_light_offset_ms),
            hold: settings.hold_duration(),
        }
    }

    pub fn on_offset(&self, light: usize) -> Duration {
        self.base_delay + self.per_light_offset * light as u32
    }

    pub fn off_offset(&self, light: usize) -> Duration {
        self.on_offset(light) + LIGHT_SPAN.saturating_sub(self.per_light_offset)
    }

    pub fn ready_offset(&self) -> Duration {
        self.off_offset(LIGHT_COUNT - 1) + self.hold
    }
}

/// Light panel state plus the generation of the sequence that owns it.
#[derive(Debug, Default)]
pub struct LightSequencer {
    lights: [bool; LIGHT_COUNT],
    generation: u64,
    ready_at: Option<Instant>,
}

impl LightSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a sequence at `now`, scheduling every light change and the
    /// ready event. Returns the new generation.
    pub(crate) fn start(
        &mut self,
        now: Instant,
        timing: &LightTiming,
        scheduler: &mut Scheduler,
    ) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.lights = [false; LIGHT_COUNT];
        self.ready_at = None;
        let generation = self.generation;
        for light in 0..LIGHT_COUNT {
            scheduler.schedule_after(
                now,
                timing.on_offset(light),
                TimerEvent::Light {
                    generation,
                    light,
                    on: true,
                },
            );
            scheduler.schedule_after(
                now,
                timing.off_offset(light),
                TimerEvent::Light {
                    generation,
                    light,
                    on: false,
                },
            );
        }
        scheduler.schedule_after(now, timing.ready_offset(), TimerEvent::Ready { generation });
        info!(
            "Light sequence {generation} started, ready in {} ms",
            timing.ready_offset().as_millis()
        );
        generation
    }

    /// Apply one light change. Lights are independent, so changes from an
    /// uncancelled earlier sequence still land.
    pub(crate) fn set_light(&mut self, generation: u64, light: usize, on: bool) {
        if let Some(slot) = self.lights.get_mut(light) {
            *slot = on;
            debug!(
                "Light {light} {} (sequence {generation})",
                if on { "on" } else { "off" }
            );
        }
    }

    /// Record the ready timestamp once per sequence. Ready events from a
    /// superseded sequence are ignored.
    pub(crate) fn mark_ready(&mut self, generation: u64, at: Instant) -> bool {
        if generation != self.generation || self.ready_at.is_some() {
            return false;
        }
        self.ready_at = Some(at);
        info!("Lights out, sequence {generation} ready");
        true
    }

    pub fn lights(&self) -> [bool; LIGHT_COUNT] {
        self.lights
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ready_at(&self) -> Option<Instant> {
        self.ready_at
    }

    pub(crate) fn reset(&mut self) {
        self.lights = [false; LIGHT_COUNT];
        self.ready_at = None;
    }
}
