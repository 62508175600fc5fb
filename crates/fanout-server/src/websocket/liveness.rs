//! Read-deadline tracking.
//!
//! Every inbound frame, including pongs, pushes the deadline out by the
//! configured window. The inbound pump waits on [`Liveness::deadline`] and
//! treats reaching it as a dead peer.

use std::time::Duration;

use tokio::time::Instant;

/// Whether the peer has been heard from recently enough.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    /// The deadline is still ahead.
    Alive,
    /// The deadline passed with no inbound frame.
    Dead,
}

/// Sliding read deadline.
#[derive(Debug, Clone)]
pub struct Liveness {
    window: Duration,
    deadline: Instant,
}

impl Liveness {
    /// Start tracking with the deadline `window` from now.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: Instant::now() + window,
        }
    }

    /// Record inbound activity.
    pub fn touch(&mut self) {
        self.deadline = Instant::now() + self.window;
    }

    /// Instant at which the peer is considered dead.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left before the deadline.
    #[cfg(test)]
    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Current state.
    #[cfg(test)]
    pub(crate) fn state(&self) -> LivenessState {
        if Instant::now() >= self.deadline {
            LivenessState::Dead
        } else {
            LivenessState::Alive
        }
    }
}
