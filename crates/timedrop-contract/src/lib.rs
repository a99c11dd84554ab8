#![warn(missing_docs)]
//! # timedrop-contract
//!
//! ## Purpose
//! Defines the wire contract between the upload client and the server.
//!
//! ## Responsibilities
//! - Name the multipart fields and headers a submission carries.
//! - Parse success and validation-failure bodies of the upload endpoint.
//! - Parse cleanup responses and render their user-facing summary.
//!
//! ## Data flow
//! HTTP status + raw body -> [`interpret_upload_response`] ->
//! [`UploadOutcome`] consumed by the upload coordinator.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs so they outlive the transient response
//! buffer.
//!
//! ## Error model
//! Invalid JSON or blank mandatory fields return [`ContractError`]; the
//! interpreter folds those into [`UploadOutcome::TransportFailure`] so callers
//! never see a raw decode error.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use timedrop_core::{FieldErrors, TransportFailureKind, UploadOutcome};

/// Multipart field and header value carrying the anti-forgery token.
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Path of the expired-file cleanup endpoint.
pub const CLEANUP_PATH: &str = "/api/cleanup-files";

/// Body of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAccepted {
    /// Download page the client navigates to.
    pub redirect_url: String,
}

/// Body of a rejected upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRejected {
    /// Messages per form field.
    pub errors: FieldErrors,
}

/// Body returned by the cleanup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    /// Whether the cleanup ran.
    pub success: bool,
    /// Number of expired files removed.
    #[serde(default)]
    pub num_files_deleted: u64,
}

/// Parses a success body.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON and
/// [`ContractError::InvalidContract`] for a blank `redirect_url`.
pub fn parse_upload_accepted(raw: &str) -> Result<UploadAccepted, ContractError> {
    let parsed: UploadAccepted = serde_json::from_str(raw)?;
    if parsed.redirect_url.trim().is_empty() {
        return Err(ContractError::InvalidContract(
            "redirect_url is empty".to_string(),
        ));
    }
    Ok(parsed)
}

/// Parses a validation-failure body.
///
/// # Errors
/// Returns [`ContractError::Decode`] when `errors` is missing or malformed.
pub fn parse_upload_rejected(raw: &str) -> Result<UploadRejected, ContractError> {
    Ok(serde_json::from_str(raw)?)
}

/// Parses a cleanup body.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON.
pub fn parse_cleanup_response(raw: &str) -> Result<CleanupResponse, ContractError> {
    Ok(serde_json::from_str(raw)?)
}

/// Maps one HTTP answer of the upload endpoint onto an [`UploadOutcome`].
///
/// 2xx bodies must carry `redirect_url`; any other status must carry
/// `errors`. Everything else is a decode failure.
pub fn interpret_upload_response(status: u16, body: &str) -> UploadOutcome {
    let decoded = if (200..300).contains(&status) {
        parse_upload_accepted(body).map(|accepted| UploadOutcome::Success {
            redirect_url: accepted.redirect_url,
        })
    } else {
        parse_upload_rejected(body).map(|rejected| UploadOutcome::ValidationFailure {
            field_errors: rejected.errors,
        })
    };

    decoded.unwrap_or_else(|error| UploadOutcome::TransportFailure {
        kind: TransportFailureKind::Decode,
        detail: format!("status {status}: {error}"),
    })
}

/// Summary shown after a cleanup run, `None` when it did not succeed.
pub fn cleanup_message(response: &CleanupResponse) -> Option<String> {
    response
        .success
        .then(|| deleted_files_message(response.num_files_deleted))
}

/// Singular/plural deletion summary.
pub fn deleted_files_message(count: u64) -> String {
    if count == 1 {
        "Successfully deleted 1 file.".to_string()
    } else {
        format!("Successfully deleted {count} files.")
    }
}

/// Contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed body violates contract invariants.
    #[error("response contract violation: {0}")]
    InvalidContract(String),
}
