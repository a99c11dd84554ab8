#![warn(missing_docs)]
//! # timedrop-upload
//!
//! ## Purpose
//! Sends the consolidated file to the upload endpoint and reports one tagged
//! outcome per attempt.
//!
//! ## Responsibilities
//! - Validate endpoint URLs before any request is built.
//! - Build the multipart body: file part, anti-forgery token, expiry instant.
//! - Enforce the upload deadline and classify failures.
//! - Call the cleanup endpoint for expired files.
//!
//! ## Data flow
//! Coordinator -> [`UploadRequest`] -> [`UploadTransport::submit`] -> HTTP ->
//! [`timedrop_contract::interpret_upload_response`] -> [`UploadOutcome`].
//!
//! ## Ownership and lifetimes
//! The request owns the file bytes; the multipart body takes them by value so
//! no copy is kept while the upload is in flight.
//!
//! ## Error model
//! Construction problems (bad endpoint, client build failure) are
//! [`UploadError`]. Everything that happens after the request starts is folded
//! into [`UploadOutcome`], so the coordinator has a single value to branch on.
//!
//! ## Security and privacy notes
//! The anti-forgery token is redacted from `Debug` output and never logged.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use timedrop_contract::{
    CLEANUP_PATH, CSRF_FORM_FIELD, CSRF_HEADER, CleanupResponse, ContractError,
    interpret_upload_response, parse_cleanup_response,
};
use timedrop_core::{FIELD_EXPIRY, StagedFile, TransportFailureKind, UploadOutcome};
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound for one upload request.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// One submission as handed to a transport.
#[derive(Clone)]
pub struct UploadRequest {
    /// File to transmit (already consolidated).
    pub file: StagedFile,
    /// Multipart field name of the file part.
    pub file_field: String,
    /// Absolute expiry instant, RFC 3339.
    pub expiry_iso: String,
    /// Opaque anti-forgery token.
    pub csrf_token: String,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file.name())
            .field("size_bytes", &self.file.size_bytes())
            .field("file_field", &self.file_field)
            .field("expiry_iso", &self.expiry_iso)
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

/// Performs one submission and interprets the answer.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Sends `request`; every failure is reported inside the outcome.
    async fn submit(&self, request: UploadRequest) -> UploadOutcome;
}

/// Validates an endpoint URL.
///
/// # Errors
/// Returns [`UploadError::InvalidEndpoint`] for malformed URLs or schemes other
/// than `http`/`https`.
pub fn validate_endpoint(endpoint: &str) -> Result<Url, UploadError> {
    let parsed = Url::parse(endpoint)
        .map_err(|error| UploadError::InvalidEndpoint(format!("invalid url: {error}")))?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" => {
            warn!(endpoint = %parsed, "endpoint is not using https");
            Ok(parsed)
        }
        other => Err(UploadError::InvalidEndpoint(format!(
            "unsupported scheme {other}"
        ))),
    }
}

/// Content type announced for the file part.
pub fn content_type_for(file_name: &str) -> &'static str {
    if file_name.to_ascii_lowercase().ends_with(".zip") {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}

/// Maps a client error onto a transport failure category.
pub fn classify_transport_error(error: &reqwest::Error) -> TransportFailureKind {
    if error.is_timeout() {
        TransportFailureKind::Timeout
    } else if error.is_decode() {
        TransportFailureKind::Decode
    } else {
        TransportFailureKind::Network
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, UploadError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| UploadError::Client(error.to_string()))
}

/// Multipart HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Creates a transport posting to `endpoint` with the given deadline.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] or [`UploadError::Client`].
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, UploadError> {
        Ok(Self {
            endpoint: validate_endpoint(endpoint)?,
            client: build_client(timeout)?,
        })
    }

    /// Configured endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: UploadRequest) -> Result<(u16, String), reqwest::Error> {
        let file_name = request.file.name().to_string();
        let part = Part::bytes(request.file.into_content())
            .file_name(file_name.clone())
            .mime_str(content_type_for(&file_name))?;
        let form = Form::new()
            .part(request.file_field, part)
            .text(CSRF_FORM_FIELD, request.csrf_token.clone())
            .text(FIELD_EXPIRY, request.expiry_iso);

        // Same-origin checks on https reject posts without a referer.
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CSRF_HEADER, request.csrf_token)
            .header(REFERER, self.endpoint.as_str())
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn submit(&self, request: UploadRequest) -> UploadOutcome {
        info!(endpoint = %self.endpoint, ?request, "uploading file");
        match self.send(request).await {
            Ok((status, body)) => {
                debug!(status, "upload response received");
                interpret_upload_response(status, &body)
            }
            Err(error) => UploadOutcome::TransportFailure {
                kind: classify_transport_error(&error),
                detail: error.to_string(),
            },
        }
    }
}

/// Client for the expired-file cleanup endpoint.
#[derive(Debug, Clone)]
pub struct CleanupClient {
    client: reqwest::Client,
    url: Url,
}

impl CleanupClient {
    /// Creates a cleanup client for the site at `base_url`.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] or [`UploadError::Client`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let base = validate_endpoint(base_url)?;
        let url = base
            .join(CLEANUP_PATH)
            .map_err(|error| UploadError::InvalidEndpoint(error.to_string()))?;
        Ok(Self {
            client: build_client(timeout)?,
            url,
        })
    }

    /// Cleanup endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Asks the server to delete expired files.
    ///
    /// # Errors
    /// Returns [`UploadError::Request`] for transport failures and
    /// [`UploadError::Contract`] for unexpected bodies.
    pub async fn run(&self, csrf_token: &str) -> Result<CleanupResponse, UploadError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CSRF_HEADER, csrf_token)
            .header(REFERER, self.url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let body = response.text().await?;
        Ok(parse_cleanup_response(&body)?)
    }
}

/// Transport construction and cleanup errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Endpoint URL is unusable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// HTTP client could not be created.
    #[error("http client setup failed: {0}")]
    Client(String),
    /// Request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response body violated the contract.
    #[error(transparent)]
    Contract(#[from] ContractError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for endpoint policy and request redaction.

    use super::*;

    #[test]
    fn accepts_http_and_https_only() {
        assert!(validate_endpoint("https://drop.example.test/upload/").is_ok());
        assert!(validate_endpoint("http://localhost:8000/").is_ok());
        assert!(validate_endpoint("ftp://drop.example.test/").is_err());
        assert!(validate_endpoint("not a url").is_err());
    }

    #[test]
    fn cleanup_url_is_rooted_at_site() {
        let client = CleanupClient::new(
            "https://drop.example.test/files/upload/",
            DEFAULT_UPLOAD_TIMEOUT,
        )
        .expect("client should build");
        assert_eq!(
            client.url().as_str(),
            "https://drop.example.test/api/cleanup-files"
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let request = UploadRequest {
            file: StagedFile::new("a.txt", b"x".to_vec()).expect("file should build"),
            file_field: "file_content".to_string(),
            expiry_iso: "2024-06-15T09:45:00Z".to_string(),
            csrf_token: "s3cr3t-token".to_string(),
        };
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("s3cr3t-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn zip_files_are_announced_as_zip() {
        assert_eq!(content_type_for("combined.ZIP"), "application/zip");
        assert_eq!(content_type_for("a.txt"), "application/octet-stream");
    }
}
