//! Shared fixtures for app integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::macros::datetime;
use time::{Duration, OffsetDateTime, UtcOffset};
use timedrop_app::{Collaborators, FormBinding, Navigator, UploadCoordinator};
use timedrop_clock::{DeadlineAdapter, ExpiryBound, ManualClock, SharedExpiryField, lock_field};
use timedrop_core::{FIELD_FILE_CONTENT, FieldErrors, FileRules, StagedFile, UploadOutcome};
use timedrop_ui::NotificationSurface;
use timedrop_upload::{UploadRequest, UploadTransport};

/// Instant the fixture form is loaded at.
#[allow(dead_code)]
pub const LOADED_AT: OffsetDateTime = datetime!(2024-06-15 08:00 UTC);

/// Anti-forgery token used by every fixture.
#[allow(dead_code)]
pub const TOKEN: &str = "token-123";

/// Transport answering every request with one scripted outcome.
pub struct ScriptedTransport {
    outcome: UploadOutcome,
    requests: Mutex<Vec<UploadRequest>>,
}

impl ScriptedTransport {
    /// Requests received so far.
    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().expect("request lock should work").clone()
    }

    /// Number of submissions received.
    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("request lock should work").len()
    }
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    async fn submit(&self, request: UploadRequest) -> UploadOutcome {
        self.requests
            .lock()
            .expect("request lock should work")
            .push(request);
        self.outcome.clone()
    }
}

/// Navigator recording every target.
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Targets navigated to so far.
    #[allow(dead_code)]
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().expect("navigator lock should work").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.visited
            .lock()
            .expect("navigator lock should work")
            .push(url.to_string());
    }
}

/// Coordinator wired to fakes, with handles on every collaborator.
pub struct Harness {
    /// Coordinator under test.
    pub coordinator: UploadCoordinator,
    /// Scripted transport.
    pub transport: Arc<ScriptedTransport>,
    /// Recording navigator.
    pub navigator: Arc<RecordingNavigator>,
    /// Notification surface.
    pub notifications: Arc<NotificationSurface>,
    /// Expiry field shared with the coordinator.
    pub expiry_field: SharedExpiryField,
}

impl Harness {
    /// Current expiry field value.
    #[allow(dead_code)]
    pub fn expiry_value(&self) -> String {
        lock_field(&self.expiry_field).value.clone()
    }
}

/// Builds a harness without file rules.
#[allow(dead_code)]
pub fn harness(outcome: UploadOutcome) -> Harness {
    harness_with_rules(outcome, FileRules::default())
}

/// Builds a harness; the form allows expiry between now and seven days out,
/// pre-filled one day out, in UTC.
pub fn harness_with_rules(outcome: UploadOutcome, rules: FileRules) -> Harness {
    let clock = Arc::new(ManualClock::new(LOADED_AT));
    let bound = ExpiryBound {
        initial: Some(LOADED_AT + Duration::days(1)),
        min: Some(LOADED_AT),
        max: Some(LOADED_AT + Duration::days(7)),
    };
    let deadline = Arc::new(DeadlineAdapter::capture(clock, Arc::new(UtcOffset::UTC), &bound));
    let expiry_field = SharedExpiryField::default();
    deadline.initialize(&mut lock_field(&expiry_field));

    let transport = Arc::new(ScriptedTransport {
        outcome,
        requests: Mutex::new(Vec::new()),
    });
    let navigator = Arc::new(RecordingNavigator::default());
    let notifications = Arc::new(NotificationSurface::new());

    let coordinator = UploadCoordinator::new(
        FormBinding {
            file_field: FIELD_FILE_CONTENT.to_string(),
            csrf_token: TOKEN.to_string(),
            rules,
        },
        Collaborators {
            notifications: Arc::clone(&notifications),
            deadline,
            expiry_field: Arc::clone(&expiry_field),
            transport: transport.clone(),
            navigator: navigator.clone(),
        },
    );

    Harness {
        coordinator,
        transport,
        navigator,
        notifications,
        expiry_field,
    }
}

/// Creates a staged file fixture.
#[allow(dead_code)]
pub fn file(name: &str, content: &[u8]) -> StagedFile {
    StagedFile::new(name, content.to_vec()).expect("file fixture should be valid")
}

/// Successful outcome redirecting to `url`.
#[allow(dead_code)]
pub fn redirect_to(url: &str) -> UploadOutcome {
    UploadOutcome::Success {
        redirect_url: url.to_string(),
    }
}

/// Validation failure with the given field messages.
#[allow(dead_code)]
pub fn rejected_with(pairs: &[(&str, &str)]) -> UploadOutcome {
    UploadOutcome::ValidationFailure {
        field_errors: FieldErrors::from_pairs(pairs.iter().copied()),
    }
}
