/*!
A cancellable fixed-interval schedule for live refreshes
*/
use std::time::{Duration, Instant};

/// The default time between live refreshes
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// A fixed-interval schedule, polled with explicit instants.
///
/// The next tick is only scheduled once the previous one has completed, so ticks never overlap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RefreshSchedule {
    /// The time between ticks
    pub interval: Duration,
    next: Option<Instant>,
}

impl Default for RefreshSchedule {
    fn default() -> RefreshSchedule {
        RefreshSchedule::new(REFRESH_INTERVAL)
    }
}

impl RefreshSchedule {
    /// A stopped schedule ticking every `interval` once started
    pub fn new(interval: Duration) -> RefreshSchedule {
        RefreshSchedule {
            interval,
            next: None,
        }
    }

    /// Schedule the first tick one interval after `now`, replacing any pending tick
    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    /// Drop any pending tick
    pub fn cancel(&mut self) {
        self.next = None;
    }

    /// Whether a tick is pending
    #[inline]
    pub fn is_active(&self) -> bool {
        self.next.is_some()
    }

    /// When the pending tick is due
    #[inline]
    pub fn next_due(&self) -> Option<Instant> {
        self.next
    }

    /// Whether a tick is pending and due at `now`
    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.next, Some(next) if next <= now)
    }

    /// Mark the pending tick as done at `now`, scheduling the following one.
    /// Does nothing if the schedule was cancelled in the meantime.
    pub fn complete(&mut self, now: Instant) {
        if self.next.is_some() {
            self.next = Some(now + self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_after_each_interval() {
        let t0 = Instant::now();
        let mut schedule = RefreshSchedule::new(Duration::from_secs(10));
        assert!(!schedule.is_due(t0 + Duration::from_secs(60)));
        schedule.start(t0);
        assert!(!schedule.is_due(t0 + Duration::from_secs(9)));
        assert!(schedule.is_due(t0 + Duration::from_secs(10)));
        // A slow tick pushes the next one back
        schedule.complete(t0 + Duration::from_secs(13));
        assert!(!schedule.is_due(t0 + Duration::from_secs(20)));
        assert_eq!(schedule.next_due(), Some(t0 + Duration::from_secs(23)));
    }

    #[test]
    fn cancel_drops_pending_tick() {
        let t0 = Instant::now();
        let mut schedule = RefreshSchedule::default();
        schedule.start(t0);
        schedule.cancel();
        assert!(!schedule.is_active());
        assert!(!schedule.is_due(t0 + Duration::from_secs(3600)));
        schedule.complete(t0 + Duration::from_secs(20));
        assert!(!schedule.is_active());
    }
}
