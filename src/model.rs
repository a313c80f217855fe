//! Batch and file records, their identifiers, and their state machines.
//!
//! ```text
//! Batch:  Pending ──start()──▶ Processing ──finalize()──▶ Completed | Failed
//! File:   Uploaded ──▶ Converting ──▶ Converted | Failed
//! ```
//!
//! Both machines only move forward. A batch is finalised once, after every
//! file it owns has reached a terminal status; [`Batch::finalize`] refuses to
//! run otherwise so readers can never observe a terminal batch with a file
//! still in flight.

use crate::error::Doc2MdError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

// ── Identifiers ──────────────────────────────────────────────────────────

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for BatchId {
    fn from(uuid: Uuid) -> Self {
        BatchId(uuid)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(BatchId)
    }
}

/// Unique identifier for an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FileId {
    fn from(uuid: Uuid) -> Self {
        FileId(uuid)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(FileId)
    }
}

// ── Statuses ─────────────────────────────────────────────────────────────

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    /// Every file converted.
    Completed,
    /// At least one file failed. There is no partial-success state.
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Converting,
    Converted,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Converted | FileStatus::Failed)
    }

    /// Strictly forward, never skipping `Converting`.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Uploaded, FileStatus::Converting)
                | (FileStatus::Converting, FileStatus::Converted)
                | (FileStatus::Converting, FileStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Converting => "converting",
            FileStatus::Converted => "converted",
            FileStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Document formats ─────────────────────────────────────────────────────

/// Accepted input formats.
///
/// `.doc` is the legacy binary format and needs an extra transcoding stage
/// to `.docx` before Markdown extraction; `.docx` is consumed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Doc,
    Docx,
}

impl DocumentFormat {
    /// Every accepted extension, dot-prefixed and lower-case.
    pub const ACCEPTED: [&'static str; 2] = [".doc", ".docx"];

    /// Detect the format from a file name, case-insensitively.
    pub fn from_filename(name: &str) -> Option<Self> {
        match extension_of(name)?.as_str() {
            ".doc" => Some(DocumentFormat::Doc),
            ".docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Doc => ".doc",
            DocumentFormat::Docx => ".docx",
        }
    }

    pub fn needs_intermediate(self) -> bool {
        self == DocumentFormat::Doc
    }
}

/// Lower-cased, dot-prefixed extension of `name`, if any.
///
/// Leading dots do not count: `.docx` on its own has no extension.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// `Report.DOCX` → `Report.md`.
pub fn markdown_filename(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_filename.to_string());
    format!("{stem}.md")
}

// ── Records ──────────────────────────────────────────────────────────────

/// One upload request's unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: BatchId,
    pub created_at: DateTime<Utc>,
    /// Set once, together with a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    pub error_message: Option<String>,
}

impl Batch {
    pub fn new() -> Self {
        Self {
            id: BatchId::new(),
            created_at: Utc::now(),
            completed_at: None,
            status: BatchStatus::Pending,
            error_message: None,
        }
    }

    pub fn start(&mut self) {
        if self.status == BatchStatus::Pending {
            self.status = BatchStatus::Processing;
        }
    }

    /// Close the batch: `Completed` if every file converted, `Failed` otherwise.
    ///
    /// With `aggregate_errors` the per-file messages are also folded into the
    /// batch-level `error_message`; by default it stays empty and the files
    /// carry the detail.
    pub fn finalize(&mut self, files: &[FileRecord], aggregate_errors: bool) -> Result<(), Doc2MdError> {
        if self.status.is_terminal() {
            return Err(Doc2MdError::Internal(format!(
                "batch {} is already {}",
                self.id, self.status
            )));
        }
        if let Some(pending) = files.iter().find(|f| !f.status.is_terminal()) {
            return Err(Doc2MdError::Internal(format!(
                "batch {} cannot finish: file {} is still {}",
                self.id, pending.id, pending.status
            )));
        }

        let failed: Vec<&FileRecord> = files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
            .collect();

        self.status = if !files.is_empty() && failed.is_empty() {
            BatchStatus::Completed
        } else {
            BatchStatus::Failed
        };

        if aggregate_errors && self.status == BatchStatus::Failed {
            self.error_message = Some(if files.is_empty() {
                "batch contained no files".to_string()
            } else {
                let detail = failed
                    .iter()
                    .map(|f| {
                        format!(
                            "{}: {}",
                            f.original_filename,
                            f.error_message.as_deref().unwrap_or("unknown error")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("{} of {} files failed: {}", failed.len(), files.len(), detail)
            });
        }

        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

/// One uploaded document and its conversion outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Back-reference only; the batch owns the file.
    pub batch_id: BatchId,
    pub original_filename: String,
    /// Lower-cased, dot-prefixed (`.doc` / `.docx`).
    pub file_extension: String,
    pub format: DocumentFormat,
    pub status: FileStatus,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub original_content: Bytes,
    #[serde(skip)]
    pub source_path: PathBuf,
    #[serde(skip)]
    pub converted_path: Option<PathBuf>,
    pub markdown_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        batch_id: BatchId,
        original_filename: impl Into<String>,
        format: DocumentFormat,
        original_content: Bytes,
        source_path: PathBuf,
    ) -> Self {
        Self {
            id: FileId::new(),
            batch_id,
            original_filename: original_filename.into(),
            file_extension: format.extension().to_string(),
            format,
            status: FileStatus::Uploaded,
            error_message: None,
            original_content,
            source_path,
            converted_path: None,
            markdown_content: None,
            created_at: Utc::now(),
        }
    }

    pub fn markdown_filename(&self) -> String {
        markdown_filename(&self.original_filename)
    }

    pub fn is_converted(&self) -> bool {
        self.status == FileStatus::Converted && self.markdown_content.is_some()
    }

    fn transition(&mut self, next: FileStatus) -> Result<(), Doc2MdError> {
        if !self.status.can_transition_to(next) {
            return Err(Doc2MdError::InvalidTransition {
                file: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_converting(&mut self) -> Result<(), Doc2MdError> {
        self.transition(FileStatus::Converting)
    }

    pub fn mark_converted(&mut self, markdown: String, converted_path: PathBuf) -> Result<(), Doc2MdError> {
        self.transition(FileStatus::Converted)?;
        self.markdown_content = Some(markdown);
        self.converted_path = Some(converted_path);
        self.error_message = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<(), Doc2MdError> {
        self.transition(FileStatus::Failed)?;
        self.markdown_content = None;
        self.converted_path = None;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// A batch together with the files it owns, in upload order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub files: Vec<FileRecord>,
}

impl BatchDetail {
    pub fn converted_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.is_converted())
    }
}
