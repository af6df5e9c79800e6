use std::{
    collections::HashMap,
    io::{self, Write},
    time::Instant,
};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    EventStatisticsOptions, WindowSizeSeconds,
    clock::{Clock, SystemClock},
    common::{EventBucket, Sanitizer},
};

/// Sliding-window event rate counter for in-process use.
///
/// Records named events and reports, per name, the average number of events per minute
/// over the trailing window (one hour by default).
///
/// # Algorithm
///
/// 1. **Record:** append the clock's current instant to the name's bucket
/// 2. **Query:** drop timestamps older than `now - window` from the front of the bucket
/// 3. **Rate:** `remaining / window_minutes`
///
/// # Thread Safety
///
/// - Uses [`DashMap`](dashmap::DashMap) for the name index; inserting and removing
///   names takes exclusive access to a shard, everything else shared access
/// - Each bucket carries its own lock, so unrelated names never contend
/// - A bucket lock is never held while waiting for exclusive shard access
///
/// # Semantics & Limitations
///
/// **Best-effort accuracy:**
/// - Timestamps appended concurrently may land slightly out of order
/// - Trimming stops at the first fresh timestamp, so an older one queued behind it
///   survives until it reaches the front
///
/// **Sweeping:**
/// - Every trim that empties a bucket bumps an approximate empty-bucket counter
/// - Once the counter exceeds the configured threshold, the next call sweeps the map and
///   resets the counter
/// - The sweep trims every bucket to the *current instant*, not to `now - window`.
///   Buckets left empty are removed, which in practice is nearly all of them, including
///   ones with events still inside the window
/// - Buckets that survive (an event exactly at the current instant) are trimmed the same
///   way, so their older in-window events stop counting too
///
/// # Examples
///
/// ```
/// use eventrate::{EventStatistics, clock::ManualClock};
///
/// let clock = ManualClock::new();
/// let stats = EventStatistics::new(clock.clone());
///
/// stats.inc_event("a");
/// clock.advance_minutes(61);
/// stats.inc_event("a");
///
/// // Only the second event is inside the trailing hour.
/// assert_eq!(stats.get_statistic_by_name("a"), 1.0 / 60.0);
/// ```
pub struct EventStatistics<C = SystemClock> {
    clock: C,
    window_size_seconds: WindowSizeSeconds,
    buckets: DashMap<String, EventBucket>,
    sanitizer: Sanitizer,
}

impl EventStatistics<SystemClock> {
    /// Statistics over the wall clock with default options.
    pub fn system() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> EventStatistics<C> {
    /// Create statistics reading time from `clock`, with default options.
    pub fn new(clock: C) -> Self {
        Self::with_options(clock, EventStatisticsOptions::default())
    }

    /// Create statistics reading time from `clock`.
    pub fn with_options(clock: C, options: EventStatisticsOptions) -> Self {
        Self {
            clock,
            window_size_seconds: options.window_size_seconds,
            buckets: DashMap::new(),
            sanitizer: Sanitizer::new(options.sanitize_threshold),
        }
    } // end constructor

    /// Record one occurrence of `name` at the clock's current instant.
    ///
    /// The first occurrence of a name creates its bucket. Creation takes exclusive
    /// access to the owning shard and re-checks for the name under it, so concurrent
    /// first occurrences still end up in a single bucket.
    ///
    /// May run a sweep afterwards (see [`EventStatistics`]).
    pub fn inc_event(&self, name: &str) {
        let now = self.clock.now();

        if let Some(bucket) = self.buckets.get(name) {
            bucket.push(now, &self.sanitizer);
        } else {
            match self.buckets.entry(name.to_string()) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().push_exclusive(now, &self.sanitizer);
                }
                Entry::Vacant(entry) => {
                    tracing::trace!(event_name = name, "eventrate.bucket.created");
                    entry.insert(EventBucket::starting_at(now));
                }
            }
        }

        self.maybe_sanitize(now);
    } // end method inc_event

    /// Average events per minute for `name` over the trailing window.
    ///
    /// Returns `0.0` for names that were never recorded or have been swept. Drops the
    /// bucket's stale timestamps as a side effect.
    pub fn get_statistic_by_name(&self, name: &str) -> f64 {
        let now = self.clock.now();
        self.maybe_sanitize(now);

        let Some(bucket) = self.buckets.get(name) else {
            return 0.0;
        };

        self.rate(bucket.fresh_count(self.watermark(now), &self.sanitizer))
    } // end method get_statistic_by_name

    /// Average events per minute for every name with at least one event in the window.
    ///
    /// All names are measured against a single reading of the clock. Names without
    /// fresh events are left out.
    pub fn get_all_statistics(&self) -> HashMap<String, f64> {
        let now = self.clock.now();
        self.maybe_sanitize(now);

        let watermark = self.watermark(now);

        self.buckets
            .iter()
            .filter_map(|entry| {
                match entry.value().fresh_count(watermark, &self.sanitizer) {
                    0 => None,
                    fresh => Some((entry.key().clone(), self.rate(fresh))),
                }
            })
            .collect()
    } // end method get_all_statistics

    /// Write one `name -> rate` line per entry of [`get_all_statistics`], sorted by name.
    ///
    /// [`get_all_statistics`]: EventStatistics::get_all_statistics
    pub fn write_statistics<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut statistics: Vec<_> = self.get_all_statistics().into_iter().collect();
        statistics.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, rate) in statistics {
            writeln!(writer, "{name} -> {rate}")?;
        }

        Ok(())
    }

    /// Print [`get_all_statistics`](EventStatistics::get_all_statistics) to stdout.
    pub fn print_statistics(&self) {
        let stdout = io::stdout();
        if let Err(err) = self.write_statistics(&mut stdout.lock()) {
            tracing::error!(error = ?err, "Failed to print event statistics");
        }
    }

    /// Sweep the store now, regardless of the empty-bucket counter.
    ///
    /// Applies the same rule as a triggered sweep and returns how many names were
    /// removed.
    pub fn sanitize_now(&self) -> usize {
        self.sweep(self.clock.now())
    }

    /// Number of names currently held, including ones whose buckets are empty.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no names are held.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn watermark(&self, now: Instant) -> Option<Instant> {
        now.checked_sub(self.window_size_seconds.as_duration())
    }

    fn rate(&self, fresh: usize) -> f64 {
        fresh as f64 / self.window_size_seconds.as_minutes()
    }

    fn maybe_sanitize(&self, now: Instant) {
        if self.sanitizer.should_sweep() {
            tracing::debug!(
                empty_buckets = self.sanitizer.empty_buckets(),
                "eventrate.sanitize.triggered"
            );
            self.sweep(now);
        }
    }

    fn sweep(&self, now: Instant) -> usize {
        let mut removed = 0;

        // Freshness is measured against `now` itself, not the window watermark, and the
        // trim applies to the buckets that are kept as well.
        self.buckets.retain(|_, bucket| {
            let keep = bucket.fresh_count_exclusive(Some(now), &self.sanitizer) > 0;
            if !keep {
                removed += 1;
            }
            keep
        });

        self.sanitizer.reset();

        tracing::debug!(
            removed,
            remaining = self.buckets.len(),
            "eventrate.sanitize.completed"
        );

        removed
    } // end method sweep

    #[cfg(test)]
    pub(crate) fn buckets(&self) -> &DashMap<String, EventBucket> {
        &self.buckets
    }

    #[cfg(test)]
    pub(crate) fn empty_buckets(&self) -> i64 {
        self.sanitizer.empty_buckets()
    }
} // end of impl
