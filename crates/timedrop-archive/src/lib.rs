#![warn(missing_docs)]
//! # timedrop-archive
//!
//! ## Purpose
//! Turns the staged file selection into exactly one file to transmit.
//!
//! ## Responsibilities
//! - Pass a single staged file through untouched.
//! - Bundle two or more files into one stored (uncompressed) zip archive that
//!   keeps names, bytes and selection order. A name already used by an earlier
//!   entry gets a ` (2)`, ` (3)`, ... suffix before its extension.
//! - Read files from disk concurrently while preserving selection order.
//!
//! ## Data flow
//! Coordinator staged list -> [`consolidate`] -> one [`StagedFile`] handed to
//! the transport.
//!
//! ## Ownership and lifetimes
//! [`consolidate`] takes the staged list by value; the archive is built on the
//! blocking pool, so the input moves into that task and the result comes back
//! as a new owned file.
//!
//! ## Error model
//! Empty selections, unreadable paths and zip/I-O failures are reported as
//! [`ArchiveError`].

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use timedrop_core::{CoreError, StagedFile};
use tokio::task::JoinSet;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Base name used when the user did not name the archive.
pub const DEFAULT_ARCHIVE_BASE_NAME: &str = "combined";

/// Extension appended to every archive name.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Resolves the archive file name from an optional user-supplied base name.
pub fn archive_file_name(base_name: Option<&str>) -> String {
    let base = base_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_ARCHIVE_BASE_NAME);
    format!("{base}{ARCHIVE_EXTENSION}")
}

/// Produces the single file to upload.
///
/// # Semantics
/// - zero files: [`ArchiveError::EmptySelection`]
/// - one file: returned unchanged
/// - more files: stored zip named by [`archive_file_name`]
///
/// # Errors
/// Returns [`ArchiveError`] for empty input or zip failures.
pub async fn consolidate(
    files: Vec<StagedFile>,
    base_name: Option<&str>,
) -> Result<StagedFile, ArchiveError> {
    if files.len() <= 1 {
        return files.into_iter().next().ok_or(ArchiveError::EmptySelection);
    }

    let name = archive_file_name(base_name);
    debug!(files = files.len(), archive = %name, "combining files");
    tokio::task::spawn_blocking(move || build_archive(&files, name))
        .await
        .map_err(|error| ArchiveError::Worker(error.to_string()))?
}

/// Builds a stored zip synchronously.
///
/// # Errors
/// Returns [`ArchiveError::EmptySelection`] for an empty slice and
/// [`ArchiveError::Zip`] / [`ArchiveError::Io`] for writer failures.
pub fn build_archive(files: &[StagedFile], name: String) -> Result<StagedFile, ArchiveError> {
    if files.is_empty() {
        return Err(ArchiveError::EmptySelection);
    }

    let mut taken = HashSet::with_capacity(files.len());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for file in files {
        let entry = unique_entry_name(file.name(), &mut taken);
        if entry != file.name() {
            debug!(file = file.name(), %entry, "renamed repeated entry");
        }
        writer.start_file(entry, options)?;
        writer.write_all(file.content())?;
    }

    let bytes = writer.finish()?.into_inner();
    Ok(StagedFile::new(name, bytes)?)
}

/// Returns `name`, or the first free `stem (n).ext` variant when an earlier
/// entry already took it. The returned name is recorded in `taken`.
pub fn unique_entry_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut counter = 2_usize;
    loop {
        let candidate = format!("{stem} ({counter}){extension}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Reads `paths` concurrently and returns staged files in the given order.
///
/// # Errors
/// Returns [`ArchiveError::Read`] for the first path that cannot be read.
pub async fn read_staged_files(paths: &[PathBuf]) -> Result<Vec<StagedFile>, ArchiveError> {
    let mut reads = JoinSet::new();
    for (index, path) in paths.iter().cloned().enumerate() {
        reads.spawn(async move {
            let content = tokio::fs::read(&path).await;
            (index, path, content)
        });
    }

    let mut slots: Vec<Option<StagedFile>> = vec![None; paths.len()];
    while let Some(joined) = reads.join_next().await {
        let (index, path, content) =
            joined.map_err(|error| ArchiveError::Worker(error.to_string()))?;
        let content = content.map_err(|source| ArchiveError::Read {
            path: path.display().to_string(),
            source,
        })?;
        slots[index] = Some(StagedFile::new(display_name(&path), content)?);
    }

    Ok(slots.into_iter().flatten().collect())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Archive consolidation errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Nothing was staged.
    #[error("Select at least one file to upload")]
    EmptySelection,
    /// Zip writer failure.
    #[error("zip failure: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// I/O failure while writing entries.
    #[error("archive i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// A staged file could not be read from disk.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Produced file violated the domain model.
    #[error("invalid staged file: {0}")]
    Core(#[from] CoreError),
    /// Background task failed.
    #[error("archive worker failed: {0}")]
    Worker(String),
}
