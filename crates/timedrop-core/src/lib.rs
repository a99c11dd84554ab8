#![warn(missing_docs)]
//! # timedrop-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `timedrop` workspace.
//!
//! ## Responsibilities
//! - Represent staged files and their client-side validation rules.
//! - Track validation flags and the source of the last blocking error.
//! - Describe the single tagged outcome of one upload attempt.
//!
//! ## Data flow
//! File events produce [`StagedFile`] values that are checked by [`FileRules`]
//! and owned by the upload coordinator. The transport answers each submission
//! with an [`UploadOutcome`], whose [`FieldErrors`] map back to an
//! [`ErrorSource`] stored in [`ValidationState`].
//!
//! ## Ownership and lifetimes
//! Staged files own their byte buffers (`Vec<u8>`) so the coordinator can move
//! them into the archive builder and the transport without borrowing across
//! await points.
//!
//! ## Error model
//! Validation failures (empty name, oversized file, malformed size setting)
//! return [`CoreError`] variants whose `Display` text is user-presentable.
//!
//! ## Example
//! ```rust
//! use timedrop_core::{FileRules, StagedFile};
//!
//! let rules = FileRules::with_max_size(1_024);
//! let file = StagedFile::new("notes.txt", b"hello".to_vec()).unwrap();
//! assert!(rules.validate(&file).is_ok());
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Form field carrying the absolute expiry instant.
pub const FIELD_EXPIRY: &str = "expiry_datetime";

/// Default form field carrying the uploaded file.
pub const FIELD_FILE_CONTENT: &str = "file_content";

/// One file selected by the user and held until submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    name: String,
    content: Vec<u8>,
}

impl StagedFile {
    /// Creates a staged file from a display name and its raw bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyFileName`] when `name` is blank.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::EmptyFileName);
        }

        Ok(Self { name, content })
    }

    /// File name as shown to the user and embedded in archives.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw file bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Size of the content in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Consumes the file and returns its bytes.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

/// Client-side checks applied before a file is staged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileRules {
    /// Upper bound for one file, in bytes. `None` disables the check.
    pub max_file_size: Option<u64>,
}

impl FileRules {
    /// Creates rules with a maximum file size.
    pub fn with_max_size(max_file_size: u64) -> Self {
        Self {
            max_file_size: Some(max_file_size),
        }
    }

    /// Validates one candidate file.
    ///
    /// # Errors
    /// Returns [`CoreError::FileTooLarge`] when the file exceeds the limit.
    pub fn validate(&self, file: &StagedFile) -> Result<(), CoreError> {
        match self.max_file_size {
            Some(limit) if file.size_bytes() > limit => Err(CoreError::FileTooLarge {
                limit: pretty_file_size(limit),
            }),
            _ => Ok(()),
        }
    }
}

/// Parses a size setting such as `50MB` or `512KB` into bytes.
///
/// Units are binary (`1KB == 1024`). A bare integer is taken as bytes.
///
/// # Errors
/// Returns [`CoreError::InvalidSizeSetting`] for unknown suffixes or
/// non-numeric prefixes.
pub fn parse_size_setting(raw: &str) -> Result<u64, CoreError> {
    let trimmed = raw.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(prefix) = upper.strip_suffix("MB") {
        (prefix, 1024 * 1024)
    } else if let Some(prefix) = upper.strip_suffix("KB") {
        (prefix, 1024)
    } else {
        (upper.as_str(), 1)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(multiplier))
        .ok_or_else(|| CoreError::InvalidSizeSetting(trimmed.to_string()))
}

/// Renders a byte count for humans using decimal units (`1000`).
pub fn pretty_file_size(bytes: u64) -> String {
    let kilobytes = bytes / 1000;
    let megabytes = kilobytes / 1000;
    let gigabytes = megabytes / 1000;
    let terabytes = gigabytes / 1000;

    if bytes < 1000 {
        format!("{bytes}B")
    } else if kilobytes < 1000 {
        format!("{kilobytes}KB")
    } else if megabytes < 1000 {
        format!("{megabytes}MB")
    } else if gigabytes < 1000 {
        format!("{gigabytes}GB")
    } else {
        format!("{terabytes}TB")
    }
}

/// Origin of the most recent blocking or displayed error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorSource {
    /// No error has been attributed.
    #[default]
    None,
    /// A staged file was rejected.
    File,
    /// The expiry field is invalid.
    Expiry,
    /// The server rejected the submission for another reason.
    Server,
}

/// Validation flags owned by the upload coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationState {
    /// A local validation error currently blocks submission.
    pub has_blocking_error: bool,
    /// Source of the last surfaced error.
    pub last_error_source: ErrorSource,
}

impl ValidationState {
    /// Records a blocking error from `source`.
    pub fn block(&mut self, source: ErrorSource) {
        self.has_blocking_error = true;
        self.last_error_source = source;
    }

    /// Records a non-blocking error (for example a server rejection).
    pub fn attribute(&mut self, source: ErrorSource) {
        self.last_error_source = source;
    }

    /// Clears the blocking flag and forgets the error source.
    pub fn reset(&mut self) {
        self.has_blocking_error = false;
        self.last_error_source = ErrorSource::None;
    }

    /// Derived submit gate: no blocking error and at least one staged file.
    pub fn submit_enabled(&self, staged_count: usize) -> bool {
        !self.has_blocking_error && staged_count > 0
    }
}

/// One field's messages as sent by the server: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    /// Single message.
    One(String),
    /// Several messages for the same field.
    Many(Vec<String>),
}

impl FieldMessages {
    fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            FieldMessages::One(message) => std::slice::from_ref(message),
            FieldMessages::Many(messages) => messages,
        };
        slice.iter().map(String::as_str)
    }
}

/// Field-level validation errors in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, FieldMessages>);

impl FieldErrors {
    /// Builds field errors from `(field, message)` pairs, keeping order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(field, message)| (field.into(), FieldMessages::One(message.into())))
                .collect(),
        )
    }

    /// Returns `true` when no field reported an error.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` when `field` reported at least one error.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterates every message, field by field, in server order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.0.values().flat_map(FieldMessages::iter)
    }

    /// Joins every message into one block, one message per line.
    pub fn joined(&self) -> String {
        self.messages().collect::<Vec<_>>().join("\n")
    }

    /// Attributes the rejection: expiry errors win over file errors, anything
    /// else is a server-side error.
    pub fn error_source(&self) -> ErrorSource {
        if self.contains(FIELD_EXPIRY) {
            ErrorSource::Expiry
        } else if self.contains(FIELD_FILE_CONTENT) {
            ErrorSource::File
        } else {
            ErrorSource::Server
        }
    }
}

/// Category of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    /// Connection or I/O failure.
    Network,
    /// The request exceeded the upload deadline.
    Timeout,
    /// The response body did not match any known contract.
    Decode,
}

/// Result of one submission, consumed exactly once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Upload accepted; the client should navigate to `redirect_url`.
    Success {
        /// Location of the download page.
        redirect_url: String,
    },
    /// Server rejected one or more form fields.
    ValidationFailure {
        /// Messages per field.
        field_errors: FieldErrors,
    },
    /// Request never produced an interpretable answer.
    TransportFailure {
        /// Failure category.
        kind: TransportFailureKind,
        /// Diagnostic detail for logs; never shown to the user.
        detail: String,
    },
}

/// Error type for core domain validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A staged file needs a name.
    #[error("File name must not be empty.")]
    EmptyFileName,
    /// File exceeds the configured size limit.
    #[error("File is too large. Maximum file size is {limit}.")]
    FileTooLarge {
        /// Human-readable limit.
        limit: String,
    },
    /// Size setting could not be parsed.
    #[error("invalid size setting: {0}")]
    InvalidSizeSetting(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for validation flags and error attribution.

    use super::*;

    #[test]
    fn submit_gate_requires_files_and_no_blocking_error() {
        let mut state = ValidationState::default();
        assert!(!state.submit_enabled(0));
        assert!(state.submit_enabled(1));

        state.block(ErrorSource::File);
        assert!(!state.submit_enabled(3));

        state.reset();
        assert!(state.submit_enabled(3));
        assert_eq!(state.last_error_source, ErrorSource::None);
    }

    #[test]
    fn expiry_errors_take_priority_over_file_errors() {
        let errors = FieldErrors::from_pairs([
            (FIELD_FILE_CONTENT, "Too big"),
            (FIELD_EXPIRY, "Must be in the future"),
        ]);
        assert_eq!(errors.error_source(), ErrorSource::Expiry);
        assert_eq!(errors.joined(), "Too big\nMust be in the future");

        let other = FieldErrors::from_pairs([("__all__", "Quota exceeded")]);
        assert_eq!(other.error_source(), ErrorSource::Server);
    }

    #[test]
    fn list_valued_messages_are_flattened_in_order() {
        let errors: FieldErrors =
            serde_json::from_str(r#"{"file_content":["first","second"],"x":"third"}"#)
                .expect("errors should decode");
        assert_eq!(errors.joined(), "first\nsecond\nthird");
    }

    #[test]
    fn size_settings_use_binary_units() {
        assert_eq!(parse_size_setting("50MB"), Ok(50 * 1024 * 1024));
        assert_eq!(parse_size_setting("512kb"), Ok(512 * 1024));
        assert_eq!(parse_size_setting("900"), Ok(900));
        assert!(parse_size_setting("big").is_err());
    }

    #[test]
    fn pretty_sizes_use_decimal_units() {
        assert_eq!(pretty_file_size(999), "999B");
        assert_eq!(pretty_file_size(1_000), "1KB");
        assert_eq!(pretty_file_size(52_428_800), "52MB");
        assert_eq!(pretty_file_size(3_000_000_000), "3GB");
        assert_eq!(pretty_file_size(7_000_000_000_000), "7TB");
    }

    #[test]
    fn oversized_files_are_rejected_with_readable_limit() {
        let rules = FileRules::with_max_size(1_000);
        let file = StagedFile::new("big.bin", vec![0; 1_001]).expect("file should build");
        assert_eq!(
            rules.validate(&file),
            Err(CoreError::FileTooLarge {
                limit: "1KB".to_string()
            })
        );
    }
}
