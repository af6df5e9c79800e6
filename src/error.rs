/// Error type for this crate.
///
/// Recording and querying never fail; only option validation does.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventRateError {
    /// The sliding window is too small to express a per-minute rate.
    #[error("invalid window size: {0}")]
    InvalidWindowSize(String),
    /// The empty-bucket threshold that triggers a sweep is out of range.
    #[error("invalid sanitize threshold: {0}")]
    InvalidSanitizeThreshold(String),
}
