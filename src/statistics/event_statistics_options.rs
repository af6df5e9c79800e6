use crate::{SanitizeThreshold, WindowSizeSeconds};

/// Configuration for [`EventStatistics`](crate::EventStatistics).
///
/// The defaults report per-minute rates over the trailing hour and sweep once more than
/// 100 buckets have gone empty.
///
/// # Examples
///
/// ```
/// use eventrate::{EventStatisticsOptions, SanitizeThreshold, WindowSizeSeconds};
///
/// let options = EventStatisticsOptions {
///     window_size_seconds: WindowSizeSeconds::try_from(600).unwrap(),
///     sanitize_threshold: SanitizeThreshold::try_from(1_000).unwrap(),
/// };
/// assert_eq!(options.window_size_seconds.as_minutes(), 10.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventStatisticsOptions {
    /// Trailing window that rates are averaged over.
    pub window_size_seconds: WindowSizeSeconds,
    /// Empty-bucket count above which the next call sweeps the store.
    pub sanitize_threshold: SanitizeThreshold,
}
