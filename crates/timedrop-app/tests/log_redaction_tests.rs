//! Integration tests for log redaction.

use timedrop_app::redact_sensitive;

#[test]
fn log_redaction_tests_removes_anti_forgery_tokens() {
    let raw = "POST failed: csrfmiddlewaretoken=abc123&expiry_datetime=2024";
    let redacted = redact_sensitive(raw);

    assert!(redacted.contains("<redacted>"));
    assert!(!redacted.contains("abc123"));
    assert!(redacted.starts_with("POST failed: "));
}

#[test]
fn log_redaction_tests_removes_header_values() {
    for raw in ["X-CSRFToken: abc123", "cookie: csrftoken=abc123", "authorization=Bearer abc123"] {
        let redacted = redact_sensitive(raw);
        assert!(redacted.contains("<redacted>"), "{raw}");
        assert!(!redacted.contains("abc123"), "{raw}");
    }
}

#[test]
fn log_redaction_tests_keeps_plain_messages() {
    assert_eq!(redact_sensitive("connection refused"), "connection refused");
}
