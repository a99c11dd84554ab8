//! Integration tests for the derived submit gate.

mod common;

use timedrop_app::CoordinatorError;
use timedrop_core::{ErrorSource, FileRules};
use timedrop_ui::UploadPhase;

fn assert_gate(harness: &common::Harness) {
    let validation = harness.coordinator.validation();
    let expected =
        !validation.has_blocking_error && !harness.coordinator.staged_files().is_empty();
    assert_eq!(harness.coordinator.submit_enabled(), expected);
}

#[test]
fn submit_gate_tests_tracks_files_and_blocking_errors_after_every_event() {
    let mut harness = common::harness_with_rules(
        common::redirect_to("/d/unused"),
        FileRules::with_max_size(4),
    );
    assert!(!harness.coordinator.submit_enabled());
    assert_eq!(harness.coordinator.phase(), UploadPhase::Idle);

    assert!(harness.coordinator.stage_file(common::file("a.txt", b"abc")));
    assert_gate(&harness);
    assert!(harness.coordinator.submit_enabled());

    assert!(!harness.coordinator.stage_file(common::file("big.bin", b"too large")));
    assert_gate(&harness);
    assert!(!harness.coordinator.submit_enabled());

    harness.coordinator.on_expiry_field_changed("2024-06-16 09:00");
    assert_gate(&harness);

    assert!(harness.coordinator.stage_file(common::file("b.txt", b"ok")));
    assert_gate(&harness);
    assert!(harness.coordinator.submit_enabled());

    harness.coordinator.remove_file("a.txt");
    harness.coordinator.remove_file("b.txt");
    assert_gate(&harness);
    assert!(!harness.coordinator.submit_enabled());
    assert_eq!(harness.coordinator.phase(), UploadPhase::Idle);
}

#[tokio::test]
async fn submit_gate_tests_zero_files_never_reach_the_transport() {
    let mut harness = common::harness(common::redirect_to("/d/unused"));

    assert_eq!(
        harness.coordinator.submit().await,
        Err(CoordinatorError::EmptySelection)
    );
    assert_eq!(harness.transport.calls(), 0);
    assert!(harness.navigator.visited().is_empty());
}

#[tokio::test]
async fn submit_gate_tests_blocking_error_refuses_submit() {
    let mut harness = common::harness_with_rules(
        common::redirect_to("/d/unused"),
        FileRules::with_max_size(4),
    );
    harness.coordinator.stage_file(common::file("a.txt", b"abc"));
    harness.coordinator.stage_file(common::file("big.bin", b"too large"));

    assert_eq!(
        harness.coordinator.validation().last_error_source,
        ErrorSource::File
    );
    assert_eq!(
        harness.coordinator.submit().await,
        Err(CoordinatorError::SubmitDisabled)
    );
    assert_eq!(harness.transport.calls(), 0);
}
