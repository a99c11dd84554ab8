//! Integration tests for transport security URL checks.

use timedrop_app::is_https_endpoint;

#[test]
fn transport_security_tests_rejects_non_https_endpoints() {
    assert!(is_https_endpoint("https://drop.example.test/upload/"));
    assert!(!is_https_endpoint("http://drop.example.test/upload/"));
    assert!(!is_https_endpoint("drop.example.test/upload/"));
}
