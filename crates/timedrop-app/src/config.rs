//! Command-line and environment configuration.
//!
//! Every connection setting can come from a flag or a `TIMEDROP_*` variable;
//! flags win.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use time::OffsetDateTime;
use timedrop_clock::ExpiryBound;
use timedrop_core::{FIELD_FILE_CONTENT, FileRules, parse_size_setting};
use url::Url;

use crate::AppError;

/// Default expiry offset from "now", in hours.
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Default upper expiry bound from "now", in hours.
pub const DEFAULT_MAX_EXPIRY_HOURS: i64 = 168;

/// Largest accepted expiry offset, in hours (ten years).
pub const EXPIRY_HOURS_LIMIT: i64 = 24 * 366 * 10;

/// Default upload deadline, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "timedrop", version, about = "Send files as a single timed download link")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage files and upload them as one download.
    Upload(UploadArgs),
    /// Ask the server to delete expired files.
    Cleanup(ConnectionArgs),
    /// Print the application version.
    Version,
}

/// Server connection settings shared by every networked subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Upload endpoint URL.
    #[arg(long, env = "TIMEDROP_ENDPOINT")]
    pub endpoint: String,
    /// Anti-forgery token sent with every request.
    #[arg(long, env = "TIMEDROP_CSRF_TOKEN", hide_env_values = true)]
    pub csrf_token: String,
    /// Request deadline in seconds.
    #[arg(long, env = "TIMEDROP_UPLOAD_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// Arguments of the `upload` subcommand.
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Files to stage, in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Connection settings.
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Multipart field name of the file part.
    #[arg(long, env = "TIMEDROP_FILE_FIELD", default_value = FIELD_FILE_CONTENT)]
    pub file_field: String,
    /// Largest accepted file, e.g. `50MB` or `512KB`.
    #[arg(long, env = "TIMEDROP_MAX_FILE_SIZE")]
    pub max_file_size: Option<String>,
    /// Expiry as local wall-clock time, `YYYY-MM-DD HH:MM`.
    #[arg(long)]
    pub expiry: Option<String>,
    /// Base name of the archive built for multi-file uploads.
    #[arg(long)]
    pub archive_name: Option<String>,
    /// Pre-filled expiry offset in hours.
    #[arg(long, env = "TIMEDROP_DEFAULT_EXPIRY_HOURS", default_value_t = DEFAULT_EXPIRY_HOURS)]
    pub default_expiry_hours: i64,
    /// Latest accepted expiry offset in hours.
    #[arg(long, env = "TIMEDROP_MAX_EXPIRY_HOURS", default_value_t = DEFAULT_MAX_EXPIRY_HOURS)]
    pub max_expiry_hours: i64,
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Upload endpoint.
    pub endpoint: Url,
    /// Anti-forgery token.
    pub csrf_token: String,
    /// Request deadline.
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Validates raw connection arguments.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for an unparsable endpoint, a blank token
    /// or a zero deadline.
    pub fn from_args(args: &ConnectionArgs) -> Result<Self, AppError> {
        let endpoint = Url::parse(args.endpoint.trim())
            .map_err(|error| AppError::Config(format!("endpoint: {error}")))?;
        if args.csrf_token.trim().is_empty() {
            return Err(AppError::Config("csrf token must not be empty".to_string()));
        }
        if args.timeout_secs == 0 {
            return Err(AppError::Config("timeout must be positive".to_string()));
        }

        Ok(Self {
            endpoint,
            csrf_token: args.csrf_token.trim().to_string(),
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }
}

/// Validated upload settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Connection settings.
    pub connection: ConnectionConfig,
    /// Multipart field name of the file part.
    pub file_field: String,
    /// Client-side file checks.
    pub rules: FileRules,
    /// Pre-filled expiry offset.
    pub default_expiry: time::Duration,
    /// Latest accepted expiry offset.
    pub max_expiry: time::Duration,
}

impl UploadConfig {
    /// Validates raw upload arguments.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for invalid connection settings, a blank
    /// field name, an unparsable size limit or inconsistent expiry offsets.
    pub fn from_args(args: &UploadArgs) -> Result<Self, AppError> {
        let connection = ConnectionConfig::from_args(&args.connection)?;

        let file_field = args.file_field.trim();
        if file_field.is_empty() {
            return Err(AppError::Config("file field must not be empty".to_string()));
        }

        let rules = match args.max_file_size.as_deref() {
            Some(raw) => FileRules::with_max_size(
                parse_size_setting(raw).map_err(|error| AppError::Config(error.to_string()))?,
            ),
            None => FileRules::default(),
        };

        if args.default_expiry_hours <= 0
            || args.max_expiry_hours < args.default_expiry_hours
            || args.max_expiry_hours > EXPIRY_HOURS_LIMIT
        {
            return Err(AppError::Config(format!(
                "expiry offsets must satisfy 0 < default ({}) <= max ({}) <= {EXPIRY_HOURS_LIMIT}",
                args.default_expiry_hours, args.max_expiry_hours
            )));
        }

        Ok(Self {
            connection,
            file_field: file_field.to_string(),
            rules,
            default_expiry: time::Duration::hours(args.default_expiry_hours),
            max_expiry: time::Duration::hours(args.max_expiry_hours),
        })
    }

    /// Form bounds as the server would render them at `now`.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] when a bound falls outside the supported
    /// date range.
    pub fn expiry_bound(&self, now: OffsetDateTime) -> Result<ExpiryBound, AppError> {
        let shifted = |offset: time::Duration| {
            now.checked_add(offset).ok_or_else(|| {
                AppError::Config(format!("expiry offset {offset} is out of range at {now}"))
            })
        };

        Ok(ExpiryBound {
            initial: Some(shifted(self.default_expiry)?),
            min: Some(now),
            max: Some(shifted(self.max_expiry)?),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for argument validation.

    use super::*;

    fn upload_args(extra: &[&str]) -> UploadArgs {
        let mut argv = vec![
            "timedrop",
            "upload",
            "a.txt",
            "--endpoint",
            "https://drop.example.test/upload/",
            "--csrf-token",
            "token-123",
        ];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("arguments should parse").command {
            Commands::Upload(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults_match_form_settings() {
        let config = UploadConfig::from_args(&upload_args(&[])).expect("config should validate");
        assert_eq!(config.file_field, FIELD_FILE_CONTENT);
        assert_eq!(config.connection.timeout, Duration::from_secs(300));
        assert_eq!(config.rules, FileRules::default());
        assert_eq!(config.default_expiry, time::Duration::hours(24));
    }

    #[test]
    fn size_limit_is_parsed() {
        let config = UploadConfig::from_args(&upload_args(&["--max-file-size", "2KB"]))
            .expect("config should validate");
        assert_eq!(config.rules, FileRules::with_max_size(2048));
    }

    #[test]
    fn rejects_inverted_expiry_offsets() {
        let args = upload_args(&["--default-expiry-hours", "48", "--max-expiry-hours", "24"]);
        assert!(matches!(
            UploadConfig::from_args(&args),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn expiry_bound_is_anchored_at_now() {
        let config = UploadConfig::from_args(&upload_args(&[])).expect("config should validate");
        let now = OffsetDateTime::UNIX_EPOCH;
        let bound = config.expiry_bound(now).expect("bound should fit");
        assert_eq!(bound.min, Some(now));
        assert_eq!(bound.initial, Some(now + time::Duration::hours(24)));
        assert_eq!(bound.max, Some(now + time::Duration::hours(168)));
    }

    #[test]
    fn rejects_expiry_offsets_beyond_limit() {
        let args = upload_args(&["--max-expiry-hours", "100000000"]);
        let error = UploadConfig::from_args(&args).expect_err("huge offset should be refused");
        assert!(matches!(error, AppError::Config(message) if message.contains("100000000")));
    }

    #[test]
    fn expiry_bound_out_of_range_is_an_error() {
        let config = UploadConfig::from_args(&upload_args(&["--max-expiry-hours", "87840"]))
            .expect("config should validate");
        let near_end = time::macros::datetime!(9999-06-01 00:00 UTC);
        assert!(matches!(
            config.expiry_bound(near_end),
            Err(AppError::Config(_))
        ));
    }
}
