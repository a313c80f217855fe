//! JSON shapes returned by the HTTP API.

use crate::convert::ToolStatus;
use crate::model::{BatchDetail, BatchId, BatchStatus, FileId, FileRecord, FileStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-file summary inside a [`BatchView`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileView {
    pub id: FileId,
    pub original_filename: String,
    pub file_extension: String,
    pub status: FileStatus,
    pub error_message: Option<String>,
    pub markdown_filename: String,
    pub markdown_content: Option<String>,
    /// Only set once the file is `converted`.
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&FileRecord> for FileView {
    fn from(f: &FileRecord) -> Self {
        Self {
            id: f.id,
            original_filename: f.original_filename.clone(),
            file_extension: f.file_extension.clone(),
            status: f.status,
            error_message: f.error_message.clone(),
            markdown_filename: f.markdown_filename(),
            markdown_content: f.markdown_content.clone(),
            download_url: f.is_converted().then(|| file_download_url(f.id)),
            created_at: f.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchView {
    pub id: BatchId,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub files: Vec<FileView>,
    pub file_count: usize,
    /// ZIP of the converted files; set once the batch is terminal.
    pub download_url: Option<String>,
}

impl From<&BatchDetail> for BatchView {
    fn from(d: &BatchDetail) -> Self {
        Self {
            id: d.batch.id,
            status: d.batch.status,
            created_at: d.batch.created_at,
            completed_at: d.batch.completed_at,
            error_message: d.batch.error_message.clone(),
            files: d.files.iter().map(FileView::from).collect(),
            file_count: d.files.len(),
            download_url: d
                .batch
                .status
                .is_terminal()
                .then(|| batch_download_url(d.batch.id)),
        }
    }
}

/// Body of `GET /api/check-pandoc/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCheckView {
    pub pandoc_installed: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl From<&ToolStatus> for ToolCheckView {
    fn from(s: &ToolStatus) -> Self {
        Self {
            pandoc_installed: s.installed,
            message: s.message().to_string(),
            version: s.version.clone(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

pub fn file_download_url(id: FileId) -> String {
    format!("/api/file/{id}/download/")
}

pub fn batch_download_url(id: BatchId) -> String {
    format!("/api/batch/{id}/download/")
}
