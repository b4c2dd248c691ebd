//! Round state machine and reaction timer.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::label::Label;

/// Where the current round stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Idle,
    Countdown,
    /// Lights are out; the timer starts sampling.
    Armed,
    Timing { elapsed_ms: u64 },
    Qualified { elapsed_ms: u64 },
    /// GO shown before the lights went out.
    Disqualified,
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameState::Qualified { .. } | GameState::Disqualified)
    }

    /// Elapsed reaction time, once the round is ready.
    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            GameState::Armed => Some(0),
            GameState::Timing { elapsed_ms } | GameState::Qualified { elapsed_ms } => {
                Some(*elapsed_ms)
            }
            _ => None,
        }
    }
}

/// Terminal outcome of one round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    Qualified { elapsed_ms: u64 },
    Disqualified,
}

/// Measures the delay between "ready" and the first GO signal.
#[derive(Debug)]
pub struct GameTimer {
    state: GameState,
    ready_at: Option<Instant>,
    sample_interval: Duration,
}

impl GameTimer {
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            state: GameState::Idle,
            ready_at: None,
            sample_interval: sample_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    pub fn ready_at(&self) -> Option<Instant> {
        self.ready_at
    }

    /// Reset into COUNTDOWN for a fresh round.
    pub fn start_round(&mut self) {
        self.state = GameState::Countdown;
        self.ready_at = None;
    }

    pub fn reset(&mut self) {
        self.state = GameState::Idle;
        self.ready_at = None;
    }

    /// The lights went out at `at`. Returns true when sampling should begin.
    pub fn on_ready(&mut self, at: Instant) -> bool {
        if self.state != GameState::Countdown {
            debug!("Ready signal ignored in state {:?}", self.state);
            return false;
        }
        self.state = GameState::Armed;
        self.ready_at = Some(at);
        true
    }

    /// Periodic sample at `at`. Returns true while sampling should continue.
    pub fn on_sample(&mut self, at: Instant) -> bool {
        let Some(ready_at) = self.ready_at else {
            return false;
        };
        match self.state {
            GameState::Armed | GameState::Timing { .. } => {
                self.state = GameState::Timing {
                    elapsed_ms: millis_between(ready_at, at),
                };
                true
            }
            _ => false,
        }
    }

    /// Feed the current control signal. HOLD never changes the state.
    pub fn on_signal(&mut self, signal: Label, now: Instant) -> Option<RoundOutcome> {
        if signal != Label::Go {
            return None;
        }
        match self.state {
            GameState::Countdown => {
                self.state = GameState::Disqualified;
                info!("Jump start: GO before lights out, disqualified");
                Some(RoundOutcome::Disqualified)
            }
            GameState::Armed | GameState::Timing { .. } => {
                let elapsed_ms = self
                    .ready_at
                    .map(|ready_at| millis_between(ready_at, now))
                    .unwrap_or(0);
                self.state = GameState::Qualified { elapsed_ms };
                info!("Qualified with reaction time {elapsed_ms} ms");
                Some(RoundOutcome::Qualified { elapsed_ms })
            }
            _ => None,
        }
    }
}

fn millis_between(from: Instant, to: Instant) -> u64 {
    to.saturating_duration_since(from).as_millis() as u64
}
