//! Error types for the edgequake-doc2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Doc2MdError`]: **Fatal** for the request: the upload is rejected
//!   before any record exists (bad shape, converter missing), or a lookup
//!   failed. Returned as `Err(Doc2MdError)` from [`crate::BatchConverter`].
//!
//! * [`ConversionError`]: **Non-fatal**: a single file failed (pandoc exited
//!   non-zero, timed out, produced nothing readable). Its message is stored on
//!   the [`crate::FileRecord`] and the batch carries on with the other files.
//!
//! A batch that partially fails is still a successful request; its status and
//! the per-file messages describe what went wrong.

use crate::model::{BatchId, FileId, FileStatus};
use std::path::PathBuf;
use thiserror::Error;

/// All request-level errors returned by the edgequake-doc2md library.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The upload violated a count, extension or size constraint.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The external converter cannot be run on this host.
    ///
    /// `hint` says where it was looked for and how to fix it.
    #[error("{tool} is not installed on the server. Please install {tool} first.")]
    ToolUnavailable { tool: String, hint: String },

    /// The request body could not be read as an upload.
    #[error("Malformed upload: {0}")]
    Upload(String),

    /// The request body outgrew the upload limit before it could be validated.
    #[error("File too large: {filename}. Maximum size is {}.", human_size(.max))]
    PayloadTooLarge { filename: String, max: u64 },

    /// The batch is still converting and cannot be removed yet.
    #[error("Batch is still being processed: {0}")]
    BatchInProgress(BatchId),

    // ── Lookup errors ─────────────────────────────────────────────────────
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),

    #[error("File not found: {0}")]
    FileNotFound(FileId),

    /// The file exists but has no Markdown yet (still running, or failed).
    #[error("File has not been converted yet: {0}")]
    NotConverted(FileId),

    // ── Invariant violations ──────────────────────────────────────────────
    #[error("Invalid status transition for file {file}: {from} → {to}")]
    InvalidTransition {
        file: FileId,
        from: FileStatus,
        to: FileStatus,
    },

    // ── Infrastructure errors ─────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2MdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Doc2MdError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why an upload was rejected. Checked before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No files uploaded. Upload at least one .doc or .docx file.")]
    NoFiles,

    #[error("Maximum {max} files allowed. You uploaded {got} files.")]
    TooManyFiles { max: usize, got: usize },

    #[error("Invalid file type: {filename}. Only .doc and .docx files are allowed.")]
    UnsupportedExtension { filename: String },

    #[error("File too large: {filename}. Maximum size is {}.", human_size(.max))]
    FileTooLarge { filename: String, size: u64, max: u64 },
}

/// The pandoc invocation a [`ConversionError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    /// `.doc` → `.docx`
    Intermediate,
    /// `.docx` → Markdown
    Markdown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Intermediate => f.write_str("Error converting .doc to .docx"),
            Stage::Markdown => f.write_str("Error converting .docx to markdown"),
        }
    }
}

/// A non-fatal error for a single file.
///
/// Rendered with `to_string()` into the file's `error_message`.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionError {
    /// pandoc exited non-zero; `detail` is its stderr.
    #[error("{stage}: Pandoc conversion failed: {detail}")]
    ToolFailed { stage: Stage, detail: String },

    #[error("{stage}: Conversion timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// pandoc could not be started at all.
    #[error("{stage}: failed to run pandoc: {detail}")]
    SpawnFailed { stage: Stage, detail: String },

    /// pandoc claimed success but the Markdown could not be read back.
    #[error("Could not read converted output '{}': {detail}", .path.display())]
    OutputUnreadable { path: PathBuf, detail: String },

    /// The per-file output directory could not be prepared.
    #[error("Could not prepare conversion workspace: {detail}")]
    Workspace { detail: String },
}

/// `10485760` → `10MB`, `1536` → `1536 bytes`.
pub(crate) fn human_size(bytes: &u64) -> String {
    let bytes = *bytes;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{bytes} bytes")
    }
}
