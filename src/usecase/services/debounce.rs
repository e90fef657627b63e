use std::time::{Duration, Instant};

/// Trailing-edge debouncer driven by an external clock.
///
/// `push` records input; `poll` yields the settled value once `delay` has
/// passed without further input. A value equal to the last one emitted is
/// swallowed.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
    last_emitted: Option<String>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            last_emitted: None,
        }
    }

    /// Records input at `now` and returns the instant at which it settles.
    pub fn push(&mut self, text: impl Into<String>, now: Instant) -> Instant {
        let deadline = now + self.delay;
        self.pending = Some((text.into(), deadline));
        deadline
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let due = matches!(&self.pending, Some((_, deadline)) if *deadline <= now);
        if !due {
            return None;
        }
        self.flush()
    }

    /// Settles pending input immediately, ignoring its deadline.
    pub fn flush(&mut self) -> Option<String> {
        let (text, _) = self.pending.take()?;
        if self.last_emitted.as_deref() == Some(text.as_str()) {
            return None;
        }
        self.last_emitted = Some(text.clone());
        Some(text)
    }

    /// Drops pending input and remembers `text` as already emitted.
    pub fn settle(&mut self, text: impl Into<String>) {
        self.pending = None;
        self.last_emitted = Some(text.into());
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_emitted = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchChannel {
    /// Re-queries as soon as input settles.
    Live,
    /// Only updates a staged value; an explicit apply runs the query.
    Staged,
}

/// The two independent search channels of one filter surface.
#[derive(Debug, Clone)]
pub struct SearchChannels {
    pub live: Debouncer,
    pub staged: Debouncer,
}

impl SearchChannels {
    pub fn new(live_delay: Duration, staged_delay: Duration) -> Self {
        Self {
            live: Debouncer::new(live_delay),
            staged: Debouncer::new(staged_delay),
        }
    }

    /// Earliest pending deadline across both channels.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.live.deadline(), self.staged.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn cancel(&mut self) {
        self.live.cancel();
        self.staged.cancel();
    }
}
