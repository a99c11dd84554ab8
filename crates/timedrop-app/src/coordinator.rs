//! Upload orchestration state machine.
//!
//! `Idle -> FilesStaged -> Submitting -> {Redirecting | Rejected}`; a rejected
//! form settles back to `FilesStaged` or `Idle` on the next event.
//!
//! The coordinator is the only writer of the notification surface and the
//! submit control. `submit` borrows it mutably for the whole upload, so no
//! staging event can interleave with an in-flight request.

use std::sync::Arc;

use thiserror::Error;
use timedrop_archive::consolidate;
use timedrop_clock::{DeadlineAdapter, SharedExpiryField, lock_field};
use timedrop_core::{ErrorSource, FileRules, StagedFile, UploadOutcome, ValidationState};
use timedrop_ui::{FormView, NotificationSurface, SubmitControl, UploadPhase};
use timedrop_upload::{UploadRequest, UploadTransport};
use tracing::{debug, error, info, warn};

use crate::redact_sensitive;

/// Info shown while the upload is in flight.
pub const UPLOAD_IN_PROGRESS_MESSAGE: &str = "Stay on this page until upload is finished.";

/// Error shown for failures that carry no field-level detail.
pub const GENERIC_UPLOAD_ERROR: &str = "Error during upload.";

/// Error shown when a file is rejected without a message.
pub const FILE_REJECTED_FALLBACK: &str = "File could not be added.";

/// Performs full-page navigation after a successful upload.
pub trait Navigator: Send + Sync {
    /// Leaves the form for `url`.
    fn navigate(&self, url: &str);
}

/// Static form settings the coordinator submits with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormBinding {
    /// Multipart field name of the file part.
    pub file_field: String,
    /// Opaque anti-forgery token.
    pub csrf_token: String,
    /// Client-side file checks.
    pub rules: FileRules,
}

/// Collaborators injected into the coordinator.
pub struct Collaborators {
    /// Notification store shared with views.
    pub notifications: Arc<NotificationSurface>,
    /// Expiry conversions.
    pub deadline: Arc<DeadlineAdapter>,
    /// Expiry input shared with the projection task.
    pub expiry_field: SharedExpiryField,
    /// Upload transport.
    pub transport: Arc<dyn UploadTransport>,
    /// Navigation sink.
    pub navigator: Arc<dyn Navigator>,
}

/// How a submit click ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// The server accepted the upload; the form navigated away.
    Redirected {
        /// Navigation target.
        url: String,
    },
    /// The submission was rejected; the form is usable again.
    Rejected {
        /// Attributed error source.
        source: ErrorSource,
        /// Message shown to the user.
        message: String,
    },
}

/// Submit attempts refused before anything happened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    /// No file is staged.
    #[error("Select at least one file to upload")]
    EmptySelection,
    /// The submit control is disabled by a blocking error.
    #[error("submit is disabled until the blocking error is resolved")]
    SubmitDisabled,
    /// An upload is in flight or the form already navigated away.
    #[error("form is locked in phase {0:?}")]
    Locked(UploadPhase),
}

/// Owns the staged files, validation flags and submit control.
pub struct UploadCoordinator {
    staged: Vec<StagedFile>,
    validation: ValidationState,
    phase: UploadPhase,
    submit: SubmitControl,
    archive_name: Option<String>,
    form: FormBinding,
    deps: Collaborators,
}

impl UploadCoordinator {
    /// Creates an idle coordinator.
    pub fn new(form: FormBinding, deps: Collaborators) -> Self {
        let mut coordinator = Self {
            staged: Vec::new(),
            validation: ValidationState::default(),
            phase: UploadPhase::Idle,
            submit: SubmitControl::default(),
            archive_name: None,
            form,
            deps,
        };
        coordinator.settle();
        coordinator
    }

    /// Current phase.
    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    /// Current validation flags.
    pub fn validation(&self) -> ValidationState {
        self.validation
    }

    /// Whether the submit control is enabled.
    pub fn submit_enabled(&self) -> bool {
        self.submit.is_enabled()
    }

    /// Staged files in selection order.
    pub fn staged_files(&self) -> &[StagedFile] {
        &self.staged
    }

    /// Whether the archive base-name input should be visible.
    pub fn show_archive_name(&self) -> bool {
        self.staged.len() > 1
    }

    /// Sets the archive base name typed by the user.
    pub fn set_archive_name(&mut self, name: Option<String>) {
        self.archive_name = name;
    }

    /// Runs the configured file rules, then records the add event.
    ///
    /// Returns `true` when the file was staged.
    pub fn stage_file(&mut self, file: StagedFile) -> bool {
        let validation_error = self
            .form
            .rules
            .validate(&file)
            .err()
            .map(|error| error.to_string());
        self.on_file_added(file, validation_error)
    }

    /// Handles a file-add event reported by the picker.
    ///
    /// A present `validation_error` rejects the file and blocks submission.
    /// Returns `true` when the file was staged.
    pub fn on_file_added(&mut self, file: StagedFile, validation_error: Option<String>) -> bool {
        if self.ignored_while_locked("file added") {
            return false;
        }

        if let Some(message) = validation_error {
            let message = if message.trim().is_empty() {
                FILE_REJECTED_FALLBACK.to_string()
            } else {
                message
            };
            warn!(file = file.name(), %message, "file rejected");
            self.validation.block(ErrorSource::File);
            self.deps.notifications.set_error(message);
            self.settle();
            return false;
        }

        debug!(file = file.name(), size_bytes = file.size_bytes(), "file staged");
        self.staged.push(file);
        self.validation.has_blocking_error = false;
        self.clear_error_from(ErrorSource::File);
        self.settle();
        true
    }

    /// Removes the first staged file called `name`.
    pub fn remove_file(&mut self, name: &str) -> Option<StagedFile> {
        if self.ignored_while_locked("file removed") {
            return None;
        }

        let index = self.staged.iter().position(|file| file.name() == name)?;
        let removed = self.staged.remove(index);
        self.on_file_removed();
        Some(removed)
    }

    /// Handles a file-remove event.
    pub fn on_file_removed(&mut self) {
        if self.ignored_while_locked("file removed") {
            return;
        }

        if self.staged.is_empty() {
            self.validation.has_blocking_error = false;
            self.clear_error_from(ErrorSource::File);
        }
        self.settle();
    }

    /// Handles an edit of the expiry input.
    pub fn on_expiry_field_changed(&mut self, value: &str) {
        if self.ignored_while_locked("expiry changed") {
            return;
        }

        let valid = {
            let mut field = lock_field(&self.deps.expiry_field);
            field.value = value.to_string();
            field.check_validity()
        };
        self.settle();

        if valid {
            self.clear_error_from(ErrorSource::Expiry);
        }
    }

    /// Consolidates the staged files and uploads them.
    ///
    /// # Errors
    /// Returns [`CoordinatorError`] when the click is refused before anything
    /// is sent. Every failure after that point is reported as
    /// [`SubmitResult::Rejected`].
    pub async fn submit(&mut self) -> Result<SubmitResult, CoordinatorError> {
        if self.phase.is_locked() {
            return Err(CoordinatorError::Locked(self.phase));
        }
        if self.staged.is_empty() {
            return Err(CoordinatorError::EmptySelection);
        }
        if !self.submit.is_enabled() {
            return Err(CoordinatorError::SubmitDisabled);
        }

        self.phase = UploadPhase::Submitting;
        self.submit.disable();

        let upload = match consolidate(self.staged.clone(), self.archive_name.as_deref()).await {
            Ok(file) => file,
            Err(error) => {
                error!(%error, "combining files failed");
                return Ok(self.reject(ErrorSource::Server, GENERIC_UPLOAD_ERROR.to_string()));
            }
        };
        self.staged = vec![upload.clone()];

        let expiry_value = lock_field(&self.deps.expiry_field).value.clone();
        let expiry_iso = match self.deps.deadline.to_iso(&expiry_value) {
            Ok(iso) => iso,
            Err(error) => return Ok(self.reject(ErrorSource::Expiry, error.to_string())),
        };

        self.deps.notifications.set_info(UPLOAD_IN_PROGRESS_MESSAGE);
        let request = UploadRequest {
            file: upload,
            file_field: self.form.file_field.clone(),
            expiry_iso,
            csrf_token: self.form.csrf_token.clone(),
        };
        debug!(?request, "submitting upload");

        match self.deps.transport.submit(request).await {
            UploadOutcome::Success { redirect_url } => {
                info!(url = %redirect_url, "upload accepted");
                self.phase = UploadPhase::Redirecting;
                self.deps.navigator.navigate(&redirect_url);
                Ok(SubmitResult::Redirected { url: redirect_url })
            }
            UploadOutcome::ValidationFailure { field_errors } => {
                let message = if field_errors.is_empty() {
                    GENERIC_UPLOAD_ERROR.to_string()
                } else {
                    field_errors.joined()
                };
                warn!(%message, "upload rejected by server");
                Ok(self.reject(field_errors.error_source(), message))
            }
            UploadOutcome::TransportFailure { kind, detail } => {
                error!(?kind, detail = %redact_sensitive(&detail), "upload failed");
                Ok(self.reject(ErrorSource::Server, GENERIC_UPLOAD_ERROR.to_string()))
            }
        }
    }

    /// Flat snapshot for rendering.
    pub fn form_view(&self) -> FormView {
        FormView {
            phase: self.phase,
            staged_files: self
                .staged
                .iter()
                .map(|file| file.name().to_string())
                .collect(),
            submit_enabled: self.submit.is_enabled(),
            show_archive_name: self.show_archive_name(),
            expiry_value: lock_field(&self.deps.expiry_field).value.clone(),
            notification: self.deps.notifications.snapshot(),
        }
    }

    fn reject(&mut self, source: ErrorSource, message: String) -> SubmitResult {
        self.validation.attribute(source);
        self.deps.notifications.set_error(message.clone());
        self.submit
            .set_enabled(self.validation.submit_enabled(self.staged.len()));
        self.phase = UploadPhase::Rejected;
        SubmitResult::Rejected { source, message }
    }

    fn clear_error_from(&mut self, source: ErrorSource) {
        if self.deps.notifications.shows_error() && self.validation.last_error_source == source {
            self.deps.notifications.clear();
            self.validation.last_error_source = ErrorSource::None;
        }
    }

    fn settle(&mut self) {
        self.submit
            .set_enabled(self.validation.submit_enabled(self.staged.len()));
        self.phase = if self.staged.is_empty() {
            UploadPhase::Idle
        } else {
            UploadPhase::FilesStaged
        };
    }

    fn ignored_while_locked(&self, event: &str) -> bool {
        if self.phase.is_locked() {
            warn!(phase = ?self.phase, event, "event ignored while form is locked");
            return true;
        }
        false
    }
}
