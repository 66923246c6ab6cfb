use chrono::{DateTime, Utc};

/// Session lifetime shared by the projector (which starts it) and the liveness
/// watchdog (which ends it).
#[derive(Debug, Default)]
pub struct SessionState {
    start: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Marks the session as started at `now` unless it already is. Returns the
    /// effective start time.
    pub fn start_if_unset(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        *self.start.get_or_insert(now)
    }

    /// Ends the session. Returns whether one was active.
    pub fn reset(&mut self) -> bool {
        self.start.take().is_some()
    }
}
