//! Rest countdown between sets.
//!
//! The timer is driven from outside: each armed tick has a deadline one
//! second after the previous one, and whoever owns the timer either calls
//! [`RestTimer::tick`] with the token it was handed, or [`RestTimer::poll`]
//! with the current time to fire every tick that has come due.
//!
//! Every `start` and `stop` bumps the token generation, so ticks scheduled for
//! an earlier countdown are ignored. Once `stop` returns no further tick can
//! change `remaining`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one countdown; stale tokens are ignored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickToken(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    Stopped,
    Running,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RestTimer {
    remaining: u32,
    duration: u32,
    generation: u64,
    next_tick_at: Option<DateTime<Utc>>,
}

impl RestTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown of `seconds`, replacing any countdown in progress
    pub fn start(&mut self, seconds: u32, now: DateTime<Utc>) -> TickToken {
        self.generation += 1;
        self.remaining = seconds;
        self.duration = seconds;
        self.next_tick_at = (seconds > 0).then(|| now + Duration::seconds(1));
        tracing::debug!("Rest timer started: {}s", seconds);
        TickToken(self.generation)
    }

    /// Cancel the countdown immediately
    pub fn stop(&mut self) {
        if self.is_running() {
            tracing::debug!("Rest timer stopped with {}s remaining", self.remaining);
        }
        self.generation += 1;
        self.remaining = 0;
        self.next_tick_at = None;
    }

    /// Add (or with a negative delta, remove) time from a running countdown.
    ///
    /// A stopped timer is left alone. Removing more than remains stops it.
    pub fn extend(&mut self, delta_seconds: i64) {
        if !self.is_running() {
            return;
        }

        let remaining = (self.remaining as i64 + delta_seconds).clamp(0, u32::MAX as i64) as u32;
        if remaining == 0 {
            self.stop();
            return;
        }

        if delta_seconds > 0 {
            self.duration = self.duration.saturating_add(delta_seconds as u32);
        }
        self.remaining = remaining;
        tracing::debug!("Rest timer extended by {}s, {}s remaining", delta_seconds, remaining);
    }

    /// Apply one tick of the countdown identified by `token`.
    ///
    /// Returns whether the tick changed anything.
    pub fn tick(&mut self, token: TickToken) -> bool {
        if token.0 != self.generation || self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        self.next_tick_at = if self.remaining == 0 {
            tracing::debug!("Rest timer finished");
            None
        } else {
            self.next_tick_at.map(|at| at + Duration::seconds(1))
        };
        true
    }

    /// Fire every tick whose deadline is at or before `now`.
    ///
    /// Returns the number of ticks applied.
    pub fn poll(&mut self, now: DateTime<Utc>) -> u32 {
        let mut fired = 0;
        while let Some(deadline) = self.next_tick_at {
            if deadline > now {
                break;
            }
            if !self.tick(TickToken(self.generation)) {
                break;
            }
            fired += 1;
        }
        fired
    }

    pub fn status(&self) -> TimerStatus {
        if self.remaining > 0 {
            TimerStatus::Running
        } else {
            TimerStatus::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == TimerStatus::Running
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Length of the current countdown including extensions
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Token of the live countdown, if any
    pub fn token(&self) -> Option<TickToken> {
        self.is_running().then_some(TickToken(self.generation))
    }

    pub fn next_tick_at(&self) -> Option<DateTime<Utc>> {
        self.next_tick_at
    }

    /// Fraction of the countdown already elapsed, in [0, 1]
    pub fn progress(&self) -> f64 {
        if self.duration == 0 || !self.is_running() {
            return 0.0;
        }
        1.0 - self.remaining as f64 / self.duration as f64
    }
}

/// "1:30" style display of a number of seconds
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
