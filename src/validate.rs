//! Upload validation, run before anything is persisted.
//!
//! Checks happen in a fixed order and stop at the first violation:
//!
//! 1. file count is within `1..=max_files`
//! 2. then, per file in upload order: extension is `.doc` / `.docx`
//!    (case-insensitive), and size is at most `max_file_bytes`
//!
//! A rejected upload leaves no batch, no file record and nothing on disk.

use crate::error::ValidationError;
use crate::model::DocumentFormat;
use bytes::Bytes;

/// One file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub name: String,
    pub content: Bytes,
}

impl UploadCandidate {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// A candidate that passed every check, with its detected format.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub name: String,
    pub format: DocumentFormat,
    pub content: Bytes,
}

/// Check count, extension and size constraints. Pure: no I/O.
pub fn validate_upload(
    candidates: Vec<UploadCandidate>,
    max_files: usize,
    max_file_bytes: u64,
) -> Result<Vec<ValidatedUpload>, ValidationError> {
    if candidates.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    if candidates.len() > max_files {
        return Err(ValidationError::TooManyFiles {
            max: max_files,
            got: candidates.len(),
        });
    }

    let mut accepted = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(format) = DocumentFormat::from_filename(&candidate.name) else {
            return Err(ValidationError::UnsupportedExtension {
                filename: candidate.name,
            });
        };
        let size = candidate.size();
        if size > max_file_bytes {
            return Err(ValidationError::FileTooLarge {
                filename: candidate.name,
                size,
                max: max_file_bytes,
            });
        }
        accepted.push(ValidatedUpload {
            name: candidate.name,
            format,
            content: candidate.content,
        });
    }
    Ok(accepted)
}
