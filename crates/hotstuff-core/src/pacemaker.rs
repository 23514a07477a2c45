//! Pacemaker (§4.2): drives `current_view` forward when progress stalls.
//!
//! Grounded on `kimberlite_vsr`'s `TimeoutKind` enum plus a `Clock` trait
//! for the timer source, itself modeled on
//! `kimberlite-sim::adapters::clock::Clock`: a production clock backed by
//! `std::time::Instant`, and a manual clock for the deterministic test
//! harness (§8) that only advances when a test calls `advance_by`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use hotstuff_types::ViewNumber;

/// What expired. A single variant today; kept as an enum (rather than a
/// bare timer) because the teacher's own pacemaker distinguishes timeout
/// causes and a future idle/heartbeat timer would join this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    ViewTimeout(ViewNumber),
}

/// A monotonic time source. `now()` returns elapsed time since some
/// arbitrary origin — callers only ever compare two `Duration`s, never
/// interpret one as wall-clock time.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Production clock: wraps `Instant::now()` relative to construction time.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Test clock: time only moves when a test calls [`ManualClock::advance_by`],
/// so multi-replica scenarios (§8) are reproducible without real sleeps.
#[derive(Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_by(&self, dt: Duration) {
        let mut elapsed = self.elapsed.lock().expect("manual clock poisoned");
        *elapsed += dt;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().expect("manual clock poisoned")
    }
}

/// One in-flight view timer (§4.2). Armed on entering a view and after
/// every vote emission; re-arming cancels the pending fire without
/// surfacing an error, matching §4.2's cancellation note.
pub struct Pacemaker<C> {
    clock: C,
    timeout: Duration,
    deadline: Option<Duration>,
    view: ViewNumber,
}

impl<C: Clock> Pacemaker<C> {
    pub fn new(clock: C, timeout: Duration) -> Self {
        Self {
            clock,
            timeout,
            deadline: None,
            view: ViewNumber::GENESIS,
        }
    }

    /// Arms (or re-arms) the timer for `view`, canceling any pending fire.
    pub fn arm(&mut self, view: ViewNumber) {
        self.view = view;
        self.deadline = Some(self.clock.now() + self.timeout);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Checks whether the armed deadline has passed. Firing clears the
    /// deadline — callers re-arm for the new view via [`Pacemaker::arm`].
    pub fn poll(&mut self) -> Option<TimeoutKind> {
        let deadline = self.deadline?;
        if self.clock.now() >= deadline {
            self.deadline = None;
            Some(TimeoutKind::ViewTimeout(self.view))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_only_after_the_timeout_elapses() {
        let clock = ManualClock::new();
        let mut pacemaker = Pacemaker::new(clock, Duration::from_secs(2));
        pacemaker.arm(ViewNumber::new(1));

        assert_eq!(pacemaker.poll(), None);
        pacemaker.clock.advance_by(Duration::from_secs(1));
        assert_eq!(pacemaker.poll(), None);
        pacemaker.clock.advance_by(Duration::from_secs(1));
        assert_eq!(pacemaker.poll(), Some(TimeoutKind::ViewTimeout(ViewNumber::new(1))));
    }

    #[test]
    fn rearming_cancels_the_pending_fire() {
        let clock = ManualClock::new();
        let mut pacemaker = Pacemaker::new(clock, Duration::from_secs(2));
        pacemaker.arm(ViewNumber::new(1));
        pacemaker.clock.advance_by(Duration::from_secs(3));
        pacemaker.arm(ViewNumber::new(2));
        assert_eq!(pacemaker.poll(), None);
    }

    #[test]
    fn cancel_suppresses_a_pending_fire() {
        let clock = ManualClock::new();
        let mut pacemaker = Pacemaker::new(clock, Duration::from_secs(1));
        pacemaker.arm(ViewNumber::new(1));
        pacemaker.clock.advance_by(Duration::from_secs(2));
        pacemaker.cancel();
        assert_eq!(pacemaker.poll(), None);
    }
}
