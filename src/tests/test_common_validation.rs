use std::time::Duration;

use crate::{EventRateError, EventStatisticsOptions, SanitizeThreshold, WindowSizeSeconds};

#[test]
fn window_size_seconds_try_from_validates_min_60() {
    let w = WindowSizeSeconds::try_from(60u64).unwrap();
    assert_eq!(*w, 60u64);
    assert_eq!(w.as_minutes(), 1.0);
    assert_eq!(w.as_duration(), Duration::from_secs(60));

    assert_eq!(
        WindowSizeSeconds::try_from(59u64).unwrap_err(),
        EventRateError::InvalidWindowSize("Window size must be at least 60 seconds".to_string())
    );
    assert!(WindowSizeSeconds::try_from(0u64).is_err());
}

#[test]
fn window_size_seconds_default_is_one_hour() {
    let w = WindowSizeSeconds::default();
    assert_eq!(*w, 3600);
    assert_eq!(w.as_minutes(), 60.0);
}

#[test]
fn sanitize_threshold_try_from_validates_range() {
    let t = SanitizeThreshold::try_from(1u64).unwrap();
    assert_eq!(*t, 1u64);

    assert_eq!(
        SanitizeThreshold::try_from(0u64).unwrap_err(),
        EventRateError::InvalidSanitizeThreshold(
            "Sanitize threshold must be greater than 0".to_string()
        )
    );
    assert!(SanitizeThreshold::try_from(u64::MAX).is_err());
    assert!(SanitizeThreshold::try_from(i64::MAX as u64).is_ok());
}

#[test]
fn sanitize_threshold_default_is_100() {
    assert_eq!(*SanitizeThreshold::default(), 100);
}

#[test]
fn options_default_combines_defaults() {
    let options = EventStatisticsOptions::default();
    assert_eq!(options.window_size_seconds, WindowSizeSeconds::default());
    assert_eq!(options.sanitize_threshold, SanitizeThreshold::default());
}

#[test]
fn errors_display_their_reason() {
    let err = WindowSizeSeconds::try_from(1u64).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid window size: Window size must be at least 60 seconds"
    );

    let err = SanitizeThreshold::try_from(0u64).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid sanitize threshold: Sanitize threshold must be greater than 0"
    );
}
