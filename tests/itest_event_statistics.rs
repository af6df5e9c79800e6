use std::{sync::Arc, thread};

use eventrate::{
    EventStatistics, EventStatisticsOptions, SanitizeThreshold, WindowSizeSeconds,
    clock::{Clock, ManualClock, SystemClock},
};

#[test]
fn system_clock_statistics_count_recent_events() {
    let stats = EventStatistics::system();

    for _ in 0..6 {
        stats.inc_event("request");
    }
    stats.inc_event("error");

    assert_eq!(stats.get_statistic_by_name("request"), 6.0 / 60.0);
    assert_eq!(stats.get_statistic_by_name("error"), 1.0 / 60.0);
    assert_eq!(stats.get_statistic_by_name("missing"), 0.0);
    assert_eq!(stats.get_all_statistics().len(), 2);
}

#[test]
fn shared_clock_handle_drives_expiry() {
    let clock = Arc::new(ManualClock::new());
    let stats = EventStatistics::new(Arc::clone(&clock));

    stats.inc_event("a");
    clock.advance_minutes(30);
    stats.inc_event("a");
    stats.inc_event("b");

    assert_eq!(stats.get_statistic_by_name("a"), 2.0 / 60.0);

    clock.advance_minutes(31);
    let all = stats.get_all_statistics();
    assert_eq!(all.get("a"), Some(&(1.0 / 60.0)));
    assert_eq!(all.get("b"), Some(&(1.0 / 60.0)));

    clock.advance_hours(1);
    assert!(stats.get_all_statistics().is_empty());
}

#[test]
fn boxed_dyn_clock_is_accepted() {
    let clock = ManualClock::new();
    let dyn_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let stats = EventStatistics::new(dyn_clock);

    stats.inc_event("a");
    clock.advance_hours(2);

    assert_eq!(stats.get_statistic_by_name("a"), 0.0);
}

#[test]
fn options_bound_memory_for_names_that_stop_recurring() {
    let clock = ManualClock::new();
    let stats = EventStatistics::with_options(
        clock.clone(),
        EventStatisticsOptions {
            window_size_seconds: WindowSizeSeconds::try_from(60).unwrap(),
            sanitize_threshold: SanitizeThreshold::try_from(10).unwrap(),
        },
    );

    for round in 0..5 {
        for i in 0..20 {
            stats.inc_event(&format!("round_{round}_name_{i}"));
        }
        clock.advance_minutes(2);
        stats.get_all_statistics();
    }

    // Each round's names go stale and are swept on the following round.
    assert!(stats.len() <= 20, "len = {}", stats.len());
}

#[test]
fn statistics_are_shareable_across_threads() {
    let stats = Arc::new(EventStatistics::new(SystemClock));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..250 {
                    stats.inc_event(&format!("worker_{t}"));
                    stats.inc_event("shared");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(stats.get_statistic_by_name("shared"), 1000.0 / 60.0);
    assert_eq!(stats.get_statistic_by_name("worker_0"), 250.0 / 60.0);
}
