//! Edge-triggered typing state: `Idle -> Typing -> Idle`. Only the edges
//! are worth a network event; input inside the window just re-arms the
//! deadline. The clock is injected so tests stay deterministic.
//!
//! The deadline does not fire by itself: the owner arms a timer and calls
//! [`TypingTracker::poll`] when it elapses.

use std::time::{Duration, Instant};

pub const TYPING_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingEdge {
    Started,
    Stopped,
}

#[derive(Debug)]
pub struct TypingTracker {
    window: Duration,
    deadline: Option<Instant>,
}

impl TypingTracker {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    /// Input happened. Reports the start edge only on the first input after
    /// idle; otherwise just re-arms the inactivity deadline.
    pub fn on_input(&mut self, now: Instant) -> Option<TypingEdge> {
        let was_idle = !self.is_typing_at(now);
        self.deadline = Some(now + self.window);
        was_idle.then_some(TypingEdge::Started)
    }

    /// The armed deadline fired (or time otherwise advanced). Reports the
    /// stop edge once if the window elapsed with no further input.
    pub fn poll(&mut self, now: Instant) -> Option<TypingEdge> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(TypingEdge::Stopped)
            }
            _ => None,
        }
    }

    /// Explicit send or loss of focus ends the typing state immediately.
    pub fn stop(&mut self) -> Option<TypingEdge> {
        self.deadline.take().map(|_| TypingEdge::Stopped)
    }

    /// Forget everything without reporting an edge (room switch, teardown).
    pub fn reset(&mut self) {
        self.deadline = None;
    }

    pub fn is_typing(&self) -> bool {
        self.deadline.is_some()
    }

    fn is_typing_at(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now < deadline)
    }
}
