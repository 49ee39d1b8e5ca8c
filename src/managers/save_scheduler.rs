//! Save scheduler.
//!
//! Turns many cheap "something changed" requests into few disk writes. The
//! scheduler never touches a real timer: it records the one outstanding
//! deadline and the engine's driver calls back when it elapses.

use tracing::debug;

use crate::types::settings::SavingSettings;

/// Delays the scheduler works with, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTimings {
    /// Minimum time between two writes.
    pub interval_ms: u64,
    /// Shortest debounce for a normal request.
    pub min_delay_ms: u64,
    /// Debounce for private-only requests.
    pub private_delay_ms: u64,
}

impl From<&SavingSettings> for SaveTimings {
    fn from(s: &SavingSettings) -> Self {
        Self {
            interval_ms: s.interval_ms,
            min_delay_ms: s.min_delay_ms,
            private_delay_ms: s.private_delay_ms,
        }
    }
}

impl Default for SaveTimings {
    fn default() -> Self {
        Self::from(&SavingSettings::default())
    }
}

/// What a save request resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    /// No wait is needed; the caller should write now.
    WriteNow,
    /// A timer was armed.
    Armed { delay_ms: u64 },
    /// The armed timer was replaced by an earlier one.
    Rearmed { delay_ms: u64 },
    /// A timer is already armed and covers this request.
    Absorbed,
}

/// Identifies the request generation a write was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteTicket {
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArmedTimer {
    queued_at_ms: u64,
    delay_ms: u64,
}

/// Debounce and coalescing state for session writes.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    timings: SaveTimings,
    pending: u32,
    pending_private_only: u32,
    /// Bumped on every request; a finished write only resets the counters
    /// if no request arrived after it started.
    generation: u64,
    last_save_ms: u64,
    timer: Option<ArmedTimer>,
    /// A synchronous flush may overlap one asynchronous write.
    writes_in_flight: u32,
}

impl SaveScheduler {
    pub fn new(timings: SaveTimings) -> Self {
        Self {
            timings,
            pending: 0,
            pending_private_only: 0,
            generation: 0,
            last_save_ms: 0,
            timer: None,
            writes_in_flight: 0,
        }
    }

    pub fn set_timings(&mut self, timings: SaveTimings) {
        self.timings = timings;
    }

    /// Counts a request without scheduling anything, for callers that write
    /// straight away.
    pub fn record(&mut self, private_only: bool) {
        self.pending += 1;
        if private_only {
            self.pending_private_only += 1;
        }
        self.generation += 1;
        debug!(
            pending = self.pending,
            private_only_pending = self.pending_private_only,
            "save requested"
        );
    }

    /// Records a save request and decides when it should be written.
    pub fn request(&mut self, private_only: bool, now_ms: u64) -> SaveDecision {
        self.record(private_only);

        match self.timer {
            None => {
                let until_interval =
                    (self.last_save_ms + self.timings.interval_ms) as i64 - now_ms as i64;
                let delay = if private_only {
                    self.timings.private_delay_ms as i64
                } else {
                    until_interval.max(self.timings.min_delay_ms as i64)
                };
                if delay > 0 {
                    self.arm(delay as u64, now_ms);
                    SaveDecision::Armed {
                        delay_ms: delay as u64,
                    }
                } else {
                    debug!("save requested with no delay");
                    SaveDecision::WriteNow
                }
            }
            Some(timer) => {
                let elapsed = now_ms.saturating_sub(timer.queued_at_ms);
                let remaining = timer.delay_ms.saturating_sub(elapsed);
                if private_only && remaining > self.timings.private_delay_ms {
                    let delay_ms = self.timings.private_delay_ms;
                    self.arm(delay_ms, now_ms);
                    debug!(delay_ms, "private save pulled the timer forward");
                    SaveDecision::Rearmed { delay_ms }
                } else {
                    debug!("save timer already running");
                    SaveDecision::Absorbed
                }
            }
        }
    }

    fn arm(&mut self, delay_ms: u64, now_ms: u64) {
        self.timer = Some(ArmedTimer {
            queued_at_ms: now_ms,
            delay_ms,
        });
        debug!(delay_ms, "save timer armed");
    }

    /// Cancels the outstanding timer. Returns whether one was armed.
    pub fn cancel_timer(&mut self) -> bool {
        self.timer.take().is_some()
    }

    /// Absolute time at which the armed timer fires.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.timer.map(|t| t.queued_at_ms + t.delay_ms)
    }

    /// Consumes the timer if it has elapsed. Returns `true` when the caller
    /// should write.
    pub fn on_timer(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms() {
            Some(deadline) if deadline <= now_ms => {
                self.timer = None;
                self.pending > 0
            }
            _ => false,
        }
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    pub fn pending_private_only(&self) -> u32 {
        self.pending_private_only
    }

    /// True when every request since the last reset was private-only.
    pub fn is_private_only(&self) -> bool {
        self.pending == self.pending_private_only
    }

    pub fn write_in_flight(&self) -> bool {
        self.writes_in_flight > 0
    }

    pub fn last_save_ms(&self) -> u64 {
        self.last_save_ms
    }

    /// Sets the reference point for the minimum write interval.
    pub fn mark_saved(&mut self, now_ms: u64) {
        self.last_save_ms = now_ms;
    }

    /// Clears both counters. Both always reset together.
    pub fn reset(&mut self) {
        self.pending = 0;
        self.pending_private_only = 0;
    }

    /// Marks a durable write as started.
    pub fn begin_write(&mut self, now_ms: u64) -> WriteTicket {
        self.writes_in_flight += 1;
        self.last_save_ms = now_ms;
        WriteTicket {
            generation: self.generation,
        }
    }

    /// Marks a durable write as finished. The counters are reset only when
    /// it succeeded and no request arrived since it started. Returns whether
    /// they were reset.
    pub fn finish_write(&mut self, ticket: WriteTicket, succeeded: bool) -> bool {
        self.writes_in_flight = self.writes_in_flight.saturating_sub(1);
        if succeeded && ticket.generation == self.generation {
            self.reset();
            true
        } else {
            false
        }
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(SaveTimings::default())
    }
}
