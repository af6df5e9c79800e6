//! In-process event rate statistics.
//!
//! State lives entirely in the current process, in a [`DashMap`](dashmap::DashMap) of
//! per-name buckets, each bucket guarded by its own lock.
//!
//! # Key Characteristics
//!
//! - **Thread-safe:** Safe for concurrent use across multiple threads
//! - **Lazy eviction:** Stale timestamps are dropped when a bucket is queried
//! - **Bounded key growth:** Empty buckets are swept once enough of them accumulate
//! - **Process-scoped:** State is not shared across processes or kept across restarts
//!
//! # Examples
//!
//! ```
//! use eventrate::{EventStatistics, clock::ManualClock};
//!
//! let clock = ManualClock::new();
//! let stats = EventStatistics::new(clock.clone());
//!
//! stats.inc_event("login");
//! stats.inc_event("login");
//! stats.inc_event("logout");
//!
//! assert_eq!(stats.get_statistic_by_name("login"), 2.0 / 60.0);
//!
//! clock.advance_hours(2);
//! assert_eq!(stats.get_statistic_by_name("login"), 0.0);
//! assert!(stats.get_all_statistics().is_empty());
//! ```

mod event_statistics;
pub use event_statistics::*;

mod event_statistics_options;
pub use event_statistics_options::*;
