//! Time sources for [`EventStatistics`](crate::EventStatistics).
//!
//! The statistics only ever ask a clock for "now" and subtract the window length from
//! it, so any monotonic source of [`Instant`]s works. [`SystemClock`] is the one to use
//! in production; [`ManualClock`] only moves when told to and is meant for tests and
//! simulations.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that stands still until advanced.
///
/// Clones share the same reading, so a test can keep one handle and give another to
/// [`EventStatistics`](crate::EventStatistics).
///
/// ```
/// use std::time::Duration;
/// use eventrate::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
/// let start = clock.now();
///
/// handle.advance_minutes(61);
/// assert_eq!(clock.now() - start, Duration::from_secs(61 * 60));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock that reads the instant it was created at.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock that reads `base` until advanced.
    pub fn starting_at(base: Instant) -> Self {
        Self {
            base,
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .offset_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
                Some(offset.saturating_add(nanos))
            });
    }

    #[cfg(test)]
    pub(crate) fn offset(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    /// Move the clock forward by whole minutes.
    pub fn advance_minutes(&self, minutes: u64) {
        self.advance(Duration::from_secs(60).saturating_mul(saturating_u32(minutes)));
    }

    /// Move the clock forward by whole hours.
    pub fn advance_hours(&self, hours: u64) {
        self.advance(Duration::from_secs(3600).saturating_mul(saturating_u32(hours)));
    }
}

fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
