#![warn(missing_docs)]
//! # timedrop-app
//!
//! ## Purpose
//! Orchestrates staging, consolidation, expiry handling and upload for
//! `timedrop`.
//!
//! ## Responsibilities
//! - Own the upload state machine ([`coordinator::UploadCoordinator`]).
//! - Wire the deadline adapter, notification surface, transport and
//!   navigator into one form session ([`session::UploadSession`]).
//! - Load configuration from flags and `TIMEDROP_*` variables.
//! - Provide log redaction and transport security checks.
//!
//! ## Data flow
//! Picked files -> coordinator staging -> archive consolidation -> multipart
//! upload -> redirect or field errors -> notification surface -> views.
//!
//! ## Ownership and lifetimes
//! The session owns the coordinator and the expiry projection task; closing or
//! dropping the session stops the projection. Shared state (notifications,
//! expiry field) lives behind `Arc` with the coordinator as the only writer of
//! notifications.
//!
//! ## Error model
//! Setup failures are wrapped in [`AppError`]. Submission failures are values
//! ([`coordinator::SubmitResult::Rejected`]) shown to the user, not errors.
//!
//! ## Security and privacy notes
//! - The anti-forgery token never appears in logs.
//! - Plain-http endpoints are accepted for local development but logged.

pub mod config;
pub mod coordinator;
pub mod logging;
pub mod session;

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use timedrop_archive::ArchiveError;
use timedrop_ui::{NotificationKind, NotificationState};
use timedrop_upload::UploadError;
use tracing::info;
use url::Url;

pub use coordinator::{
    Collaborators, CoordinatorError, FormBinding, Navigator, SubmitResult, UploadCoordinator,
};
pub use session::UploadSession;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("TIMEDROP_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Redacts anti-forgery tokens and credentials in log-safe output.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for key in [
        "csrfmiddlewaretoken",
        "x-csrftoken",
        "csrftoken",
        "cookie",
        "authorization",
        "token",
    ] {
        redacted = redact_key_value(&redacted, key);
    }
    redacted
}

fn redact_key_value(input: &str, key: &str) -> String {
    let lower = input.to_ascii_lowercase();
    if let Some(position) = lower.find(key) {
        let prefix = &input[..position];
        return format!("{prefix}{key}=<redacted>");
    }

    input.to_string()
}

/// Resolves a redirect target against the upload endpoint.
///
/// # Errors
/// Returns [`AppError::Redirect`] when `target` cannot be joined.
pub fn resolve_redirect(endpoint: &Url, target: &str) -> Result<Url, AppError> {
    endpoint
        .join(target)
        .map_err(|error| AppError::Redirect(format!("{target}: {error}")))
}

/// One-line terminal rendering of a notification.
pub fn render_notification(state: &NotificationState) -> Option<String> {
    match state.kind {
        NotificationKind::None => None,
        NotificationKind::Info => Some(format!("info: {}", state.message)),
        NotificationKind::Error => Some(format!("error: {}", state.message)),
    }
}

/// Navigator that prints the absolute download page URL.
#[derive(Debug)]
pub struct TerminalNavigator {
    endpoint: Url,
    visited: Mutex<Option<Url>>,
}

impl TerminalNavigator {
    /// Creates a navigator resolving relative targets against `endpoint`.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            visited: Mutex::new(None),
        }
    }

    /// Last resolved navigation target.
    pub fn visited(&self) -> Option<Url> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, url: &str) {
        let target = resolve_redirect(&self.endpoint, url)
            .map(|resolved| resolved.to_string())
            .unwrap_or_else(|_| url.to_string());
        info!(%target, "navigating to download page");
        println!("{target}");

        if let Ok(parsed) = Url::parse(&target) {
            *self.visited.lock().unwrap_or_else(PoisonError::into_inner) = Some(parsed);
        }
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid flags or environment.
    #[error("configuration error: {0}")]
    Config(String),
    /// Reading or combining files failed.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
    /// Transport setup or cleanup failed.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
    /// A submit click was refused.
    #[error("submit refused: {0}")]
    Submit(#[from] CoordinatorError),
    /// Redirect target could not be resolved.
    #[error("invalid redirect: {0}")]
    Redirect(String),
    /// Runtime could not be started.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
