use latmc_core::errors::{ErrorInfo, McError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("id", "1")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = McError::Config(sample_info("unknown-quantity", "no such sampling function"));
    assert_eq!(err.info().code, "unknown-quantity");
    assert!(err.info().context.contains_key("id"));
}

#[test]
fn schedule_error_surface() {
    let err = McError::Schedule(sample_info("non-monotonic", "target not past current count"));
    assert_eq!(err.info().code, "non-monotonic");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn sampling_error_surface() {
    let err = McError::Sampling(sample_info("component-width", "row width mismatch"));
    assert_eq!(err.info().code, "component-width");
}

#[test]
fn tracking_error_surface() {
    let err = McError::Tracking(sample_info("empty-candidate", "no occupant of this type"));
    assert_eq!(err.info().code, "empty-candidate");
}

#[test]
fn error_display_includes_hint() {
    let err = McError::Stats(
        ErrorInfo::new("too-few-samples", "need at least two observations").with_hint("sample longer"),
    );
    let text = err.to_string();
    assert!(text.contains("too-few-samples"));
    assert!(text.contains("sample longer"));
}
