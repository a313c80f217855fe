//! In-memory ZIP export of a batch's converted Markdown.
//!
//! Only `Converted` files are packed; everything else is skipped without
//! error, so a batch where nothing converted still yields a valid, empty
//! archive. Nothing is written to disk.

use crate::error::Doc2MdError;
use crate::model::{BatchId, FileRecord};
use bytes::Bytes;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A finished archive and the name to offer it under.
#[derive(Debug, Clone)]
pub struct ArchiveOutput {
    pub filename: String,
    pub bytes: Bytes,
}

/// `converted_files_<batch_id>.zip`
pub fn archive_filename(batch: BatchId) -> String {
    format!("converted_files_{batch}.zip")
}

/// Pack every converted file of `batch` into a Deflate-compressed ZIP.
///
/// Entries are named by each file's derived Markdown filename, in the order
/// given. When two uploads share a stem (`a.doc` and `a.docx`) the later entry
/// becomes `a (2).md`.
pub fn build_archive(batch: BatchId, files: &[FileRecord]) -> Result<ArchiveOutput, Doc2MdError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut taken = HashSet::new();

    for file in files.iter().filter(|f| f.is_converted()) {
        let Some(ref markdown) = file.markdown_content else {
            continue;
        };
        let name = unique_entry_name(&file.markdown_filename(), &mut taken);
        zip.start_file(name.as_str(), options)
            .map_err(|e| Doc2MdError::Archive(format!("entry '{name}': {e}")))?;
        zip.write_all(markdown.as_bytes())
            .map_err(|e| Doc2MdError::Archive(format!("entry '{name}': {e}")))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| Doc2MdError::Archive(format!("finalise: {e}")))?;

    Ok(ArchiveOutput {
        filename: archive_filename(batch),
        bytes: Bytes::from(cursor.into_inner()),
    })
}

/// `wanted`, or `stem (n).ext` with the smallest free `n`; records the result in `taken`.
pub fn unique_entry_name(wanted: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(wanted.to_string()) {
        return wanted.to_string();
    }
    let path = Path::new(wanted);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
