//! Deadline-ordered timer queue for the session loop.
//!
//! Every delayed action (burst samples, light changes, timer samples) is an
//! entry keyed by its deadline and insertion order. Entries belong to a
//! [`TimerGroup`] so a whole family can be cancelled at once.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::label::Label;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TimerGroup {
    Capture,
    Lights,
    GameTimer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    CaptureSample { label: Label, sample: usize },
    Light { generation: u64, light: usize, on: bool },
    Ready { generation: u64 },
    TimerSample,
}

impl TimerEvent {
    fn group(&self) -> TimerGroup {
        match self {
            TimerEvent::CaptureSample { .. } => TimerGroup::Capture,
            TimerEvent::Light { .. } | TimerEvent::Ready { .. } => TimerGroup::Lights,
            TimerEvent::TimerSample => TimerGroup::GameTimer,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    queue: BTreeMap<(Instant, u64), TimerEvent>,
    next_seq: u64,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn schedule_at(&mut self, deadline: Instant, event: TimerEvent) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.insert((deadline, seq), event);
    }

    pub(crate) fn schedule_after(&mut self, origin: Instant, delay: Duration, event: TimerEvent) {
        self.schedule_at(origin + delay, event);
    }

    /// Remove and return the earliest entry due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(Instant, TimerEvent)> {
        let (&(deadline, seq), _) = self.queue.first_key_value()?;
        if deadline > now {
            return None;
        }
        self.queue
            .remove(&(deadline, seq))
            .map(|event| (deadline, event))
    }

    /// Drop every pending entry of `group`; returns how many were removed.
    pub(crate) fn cancel(&mut self, group: TimerGroup) -> usize {
        let before = self.queue.len();
        self.queue.retain(|_, event| event.group() != group);
        before - self.queue.len()
    }

    pub(crate) fn cancel_all(&mut self) {
        self.queue.clear();
    }

    #[cfg(test)]
    pub(crate) fn pending(&self, group: TimerGroup) -> usize {
        self.queue.values().filter(|event| event.group() == group).count()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.queue.first_key_value().map(|(&(deadline, _), _)| deadline)
    }
}
