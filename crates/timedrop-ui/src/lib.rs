#![warn(missing_docs)]
//! # timedrop-ui
//!
//! ## Purpose
//! Defines the view-facing state of the upload form.
//!
//! ## Responsibilities
//! - Hold at most one notification (info or error) with replace/clear
//!   semantics, observable by any number of views.
//! - Represent the submit control and the upload phase.
//! - Project coordinator state into a flat [`FormView`] for rendering.
//!
//! ## Data flow
//! Coordinator events mutate [`NotificationSurface`] and [`SubmitControl`];
//! views subscribe to the surface and render [`FormView`] snapshots.
//!
//! ## Ownership and lifetimes
//! The surface is shared behind `Arc` between the coordinator (single writer)
//! and views. Views that redraw read the latest state through `watch`
//! receivers; views that log every message use [`NotificationSurface::history`].
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors: every mutation is
//! total, and the mutual exclusion of info and error is structural.

use tokio::sync::{broadcast, watch};

/// Messages buffered for a history subscriber that falls behind.
pub const HISTORY_CAPACITY: usize = 32;

/// Kind of the visible notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationKind {
    /// Nothing is shown.
    #[default]
    None,
    /// Informational message.
    Info,
    /// Error message.
    Error,
}

/// Currently visible notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    /// Which box is visible.
    pub kind: NotificationKind,
    /// Message text; empty when `kind` is `None`.
    pub message: String,
}

impl NotificationState {
    /// Returns `true` when the info box is visible.
    pub fn shows_info(&self) -> bool {
        self.kind == NotificationKind::Info
    }

    /// Returns `true` when the error box is visible.
    pub fn shows_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

/// Shared single-message notification store.
#[derive(Debug)]
pub struct NotificationSurface {
    state: watch::Sender<NotificationState>,
    history: broadcast::Sender<NotificationState>,
}

impl NotificationSurface {
    /// Creates an empty surface.
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(NotificationState::default()),
            history: broadcast::Sender::new(HISTORY_CAPACITY),
        }
    }

    /// Shows an info message, replacing whatever was visible.
    pub fn set_info(&self, message: impl Into<String>) {
        self.replace(NotificationKind::Info, message.into());
    }

    /// Shows an error message, replacing whatever was visible.
    pub fn set_error(&self, message: impl Into<String>) {
        self.replace(NotificationKind::Error, message.into());
    }

    /// Hides any notification.
    pub fn clear(&self) {
        self.replace(NotificationKind::None, String::new());
    }

    /// Returns the visible notification.
    pub fn snapshot(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    /// Returns `true` when an error is visible.
    pub fn shows_error(&self) -> bool {
        self.state.borrow().shows_error()
    }

    /// Subscribes a view to notification changes.
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    /// Subscribes to every change in order, including ones a `watch`
    /// receiver would coalesce.
    pub fn history(&self) -> broadcast::Receiver<NotificationState> {
        self.history.subscribe()
    }

    fn replace(&self, kind: NotificationKind, message: String) {
        let state = NotificationState { kind, message };
        // No history subscriber is not an error.
        let _ = self.history.send(state.clone());
        self.state.send_replace(state);
    }
}

impl Default for NotificationSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Upload form phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadPhase {
    /// No file staged.
    #[default]
    Idle,
    /// At least one file staged.
    FilesStaged,
    /// Upload in flight.
    Submitting,
    /// Upload accepted, navigating away. Terminal.
    Redirecting,
    /// Last submission failed; the next event settles the phase.
    Rejected,
}

impl UploadPhase {
    /// Returns `true` when the form no longer accepts staging events.
    pub fn is_locked(&self) -> bool {
        matches!(self, UploadPhase::Submitting | UploadPhase::Redirecting)
    }
}

/// The submit button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitControl {
    enabled: bool,
}

impl SubmitControl {
    /// Sets the enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Disables the control.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Returns `true` when the control can be clicked.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Flat snapshot rendered by views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    /// Current phase.
    pub phase: UploadPhase,
    /// Names of staged files, in selection order.
    pub staged_files: Vec<String>,
    /// Submit control state.
    pub submit_enabled: bool,
    /// Whether the archive base-name input is shown.
    pub show_archive_name: bool,
    /// Expiry field value.
    pub expiry_value: String,
    /// Visible notification.
    pub notification: NotificationState,
}

impl FormView {
    /// One-line summary for terminal views.
    pub fn status_line(&self) -> String {
        format!(
            "{:?}: {} file(s) staged, submit {}",
            self.phase,
            self.staged_files.len(),
            if self.submit_enabled {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for notification exclusivity.

    use super::*;

    #[test]
    fn info_and_error_are_mutually_exclusive() {
        let surface = NotificationSurface::new();
        let sequence = [
            Some(NotificationKind::Info),
            Some(NotificationKind::Error),
            None,
            Some(NotificationKind::Error),
            Some(NotificationKind::Info),
        ];

        for step in sequence {
            match step {
                Some(NotificationKind::Info) => surface.set_info("Stay on this page."),
                Some(NotificationKind::Error) => surface.set_error("Error during upload."),
                Some(NotificationKind::None) | None => surface.clear(),
            }
            let state = surface.snapshot();
            assert!(!(state.shows_info() && state.shows_error()));
            assert_eq!(state.kind == NotificationKind::None, state.message.is_empty());
        }
        assert!(surface.snapshot().shows_info());
    }

    #[tokio::test]
    async fn subscribers_observe_replacements() {
        let surface = NotificationSurface::new();
        let mut receiver = surface.subscribe();

        surface.set_error("first");
        receiver.changed().await.expect("sender should be alive");
        assert_eq!(receiver.borrow_and_update().message, "first");

        surface.clear();
        receiver.changed().await.expect("sender should be alive");
        assert_eq!(receiver.borrow().kind, NotificationKind::None);
    }

    #[test]
    fn history_keeps_messages_replaced_before_being_read() {
        let surface = NotificationSurface::new();
        let mut history = surface.history();

        surface.set_info("Stay on this page until upload is finished.");
        surface.set_error("Error during upload.");

        let first = history.try_recv().expect("info should be kept");
        let second = history.try_recv().expect("error should be kept");
        assert_eq!(first.kind, NotificationKind::Info);
        assert_eq!(second.message, "Error during upload.");
        assert!(history.try_recv().is_err());
        assert!(surface.snapshot().shows_error());
    }

    #[test]
    fn submitting_and_redirecting_lock_the_form() {
        assert!(UploadPhase::Submitting.is_locked());
        assert!(UploadPhase::Redirecting.is_locked());
        assert!(!UploadPhase::Rejected.is_locked());
    }
}
