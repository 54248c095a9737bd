use std::time::{Duration, Instant};

/// Coalesces bursts of edits into one write. Each edit pushes the deadline
/// out by the quiet period; the write fires once the deadline passes with no
/// further edits.
#[derive(Debug, Clone)]
pub struct QuietPeriod {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl QuietPeriod {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Record an edit made at `now`, replacing any pending deadline.
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    /// Drop the pending write, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// `true` exactly once per burst: when the deadline has passed at `now`.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
