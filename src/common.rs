use std::{
    collections::VecDeque,
    ops::Deref,
    sync::atomic::{AtomicI64, Ordering},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::EventRateError;

/// Length of the trailing window that rates are averaged over.
///
/// Must be at least one minute, since rates are reported per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowSizeSeconds(u64);

impl WindowSizeSeconds {
    /// Window length as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }

    /// Window length in (possibly fractional) minutes.
    pub fn as_minutes(&self) -> f64 {
        self.0 as f64 / 60.0
    }
}

impl Default for WindowSizeSeconds {
    /// Returns a window of one hour.
    fn default() -> Self {
        Self(3600)
    }
}

impl Deref for WindowSizeSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowSizeSeconds {
    type Error = EventRateError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value < 60 {
            Err(EventRateError::InvalidWindowSize(
                "Window size must be at least 60 seconds".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Number of buckets that must have gone empty before a sweep runs.
///
/// The sweep runs once the empty-bucket counter is strictly greater than this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SanitizeThreshold(u64);

impl Default for SanitizeThreshold {
    /// Returns a threshold of 100 empty buckets.
    fn default() -> Self {
        Self(100)
    }
}

impl Deref for SanitizeThreshold {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for SanitizeThreshold {
    type Error = EventRateError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(EventRateError::InvalidSanitizeThreshold(
                "Sanitize threshold must be greater than 0".to_string(),
            ))
        } else if value > i64::MAX as u64 {
            Err(EventRateError::InvalidSanitizeThreshold(
                "Sanitize threshold must fit in a signed 64-bit counter".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Approximate count of buckets that are currently empty.
///
/// Updates are not coordinated with bucket mutation, so the value can drift (and even
/// dip below zero) under contention. It only decides when a sweep is worth running.
#[derive(Debug)]
pub(crate) struct Sanitizer {
    empty_buckets: AtomicI64,
    threshold: i64,
}

impl Sanitizer {
    pub(crate) fn new(threshold: SanitizeThreshold) -> Self {
        Self {
            empty_buckets: AtomicI64::new(0),
            threshold: *threshold as i64,
        }
    }

    pub(crate) fn bucket_emptied(&self) {
        self.empty_buckets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bucket_refilled(&self) {
        self.empty_buckets.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn should_sweep(&self) -> bool {
        self.empty_buckets.load(Ordering::Relaxed) > self.threshold
    }

    pub(crate) fn reset(&self) {
        self.empty_buckets.store(0, Ordering::Relaxed);
    }

    pub(crate) fn empty_buckets(&self) -> i64 {
        self.empty_buckets.load(Ordering::Relaxed)
    }
}

/// Occurrence timestamps for one event name, oldest first.
pub(crate) struct EventBucket {
    queue: Mutex<VecDeque<Instant>>,
}

impl EventBucket {
    pub(crate) fn starting_at(timestamp: Instant) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from([timestamp])),
        }
    }

    /// Append under the bucket lock. Caller holds shared access to the store.
    pub(crate) fn push(&self, timestamp: Instant, sanitizer: &Sanitizer) {
        push_timestamp(&mut self.queue.lock(), timestamp, sanitizer);
    }

    /// Append through exclusive access to the store entry; no bucket lock is taken.
    pub(crate) fn push_exclusive(&mut self, timestamp: Instant, sanitizer: &Sanitizer) {
        push_timestamp(self.queue.get_mut(), timestamp, sanitizer);
    }

    /// Trim everything strictly older than `watermark` and return what is left.
    ///
    /// `None` keeps every timestamp.
    pub(crate) fn fresh_count(&self, watermark: Option<Instant>, sanitizer: &Sanitizer) -> usize {
        trim_to_watermark(&mut self.queue.lock(), watermark, sanitizer)
    }

    pub(crate) fn fresh_count_exclusive(
        &mut self,
        watermark: Option<Instant>,
        sanitizer: &Sanitizer,
    ) -> usize {
        trim_to_watermark(self.queue.get_mut(), watermark, sanitizer)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

fn push_timestamp(queue: &mut VecDeque<Instant>, timestamp: Instant, sanitizer: &Sanitizer) {
    queue.push_back(timestamp);

    if queue.len() == 1 {
        sanitizer.bucket_refilled();
    }
}

fn trim_to_watermark(
    queue: &mut VecDeque<Instant>,
    watermark: Option<Instant>,
    sanitizer: &Sanitizer,
) -> usize {
    let Some(watermark) = watermark else {
        return queue.len();
    };

    if queue.is_empty() {
        return 0;
    }

    while let Some(timestamp) = queue.front()
        && *timestamp < watermark
    {
        queue.pop_front();
    }

    if queue.is_empty() {
        sanitizer.bucket_emptied();
    }

    queue.len()
}
