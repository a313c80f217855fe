//! Batch orchestration: accept an upload, convert every file, close the batch.
//!
//! ## Request lifecycle
//!
//! ```text
//! create_batch(candidates)
//!  ├─ 1. Probe      pandoc --version       ── missing ─▶ Err(ToolUnavailable)
//!  ├─ 2. Validate   count / extension / size ─ bad ────▶ Err(Validation)
//!  ├─ 3. Persist    batch (Processing) + uploads + file records (Uploaded)
//!  ├─ 4. Convert    pipeline::file::convert_file per file, `concurrency` at once
//!  ├─ 5. Join       every file terminal
//!  └─ 6. Finalize   Completed iff all converted, else Failed; completed_at = now
//! ```
//!
//! Steps 1 and 2 run before anything is written, so a rejected upload leaves
//! no trace. The call returns only after step 6; there is no background queue.

use crate::archive::{self, ArchiveOutput};
use crate::config::ConversionConfig;
use crate::error::Doc2MdError;
use crate::model::{Batch, BatchDetail, BatchId, FileId, FileRecord, FileStatus};
use crate::pipeline::file::convert_file;
use crate::pipeline::pandoc::Pandoc;
use crate::store::{safe_filename, BatchStore, MediaLayout, MemoryStore};
use crate::validate::{validate_upload, UploadCandidate, ValidatedUpload};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of the converter availability probe.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub installed: bool,
    /// First line of `pandoc --version` when installed.
    pub version: Option<String>,
    pub program: PathBuf,
}

impl ToolStatus {
    pub fn message(&self) -> &'static str {
        if self.installed {
            "Pandoc is installed and ready"
        } else {
            "Pandoc is not installed. Please install Pandoc to use this service."
        }
    }
}

/// One converted file, ready to serve as an attachment.
#[derive(Debug, Clone)]
pub struct MarkdownDownload {
    pub filename: String,
    pub content: String,
}

/// The batch conversion service.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct BatchConverter {
    config: ConversionConfig,
    store: Arc<dyn BatchStore>,
    pandoc: Pandoc,
    layout: MediaLayout,
}

impl std::fmt::Debug for BatchConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchConverter")
            .field("config", &self.config)
            .field("pandoc", &self.pandoc)
            .field("layout", &self.layout)
            .finish()
    }
}

impl BatchConverter {
    pub fn new(config: ConversionConfig, store: Arc<dyn BatchStore>) -> Self {
        let pandoc = Pandoc::from_config(&config);
        let layout = MediaLayout::new(config.media_root.clone());
        Self {
            config,
            store,
            pandoc,
            layout,
        }
    }

    /// Convenience constructor backed by a fresh [`MemoryStore`].
    pub fn in_memory(config: ConversionConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    /// Probe the converter. Never fails; an unusable binary is `installed: false`.
    pub async fn check_tool(&self) -> ToolStatus {
        let version = self.pandoc.version().await;
        ToolStatus {
            installed: version.is_some(),
            version,
            program: self.pandoc.program().to_path_buf(),
        }
    }

    /// Accept an upload and convert it to completion.
    ///
    /// # Errors
    /// - [`Doc2MdError::ToolUnavailable`] if pandoc cannot run; nothing is created.
    /// - [`Doc2MdError::Validation`] for a bad upload; nothing is created.
    /// - Storage or I/O errors while persisting.
    ///
    /// Per-file conversion failures are *not* errors: the batch comes back
    /// `Failed` with the detail on each file.
    pub async fn create_batch(&self, candidates: Vec<UploadCandidate>) -> Result<BatchDetail, Doc2MdError> {
        let started = Instant::now();

        // ── Step 1: Converter must be usable ─────────────────────────────
        if !self.pandoc.is_available().await {
            return Err(Doc2MdError::ToolUnavailable {
                tool: "Pandoc".to_string(),
                hint: format!(
                    "Looked for '{}'. Install it from https://pandoc.org/installing.html or set PANDOC_PATH.",
                    self.pandoc.program().display()
                ),
            });
        }

        // ── Step 2: Validate ─────────────────────────────────────────────
        let uploads = validate_upload(candidates, self.config.max_files, self.config.max_file_bytes)?;

        // ── Step 3: Persist batch, uploads and records ───────────────────
        let mut batch = Batch::new();
        batch.start();
        self.store.insert_batch(&batch).await?;

        let files = match self.persist_uploads(&batch, uploads).await {
            Ok(files) => files,
            Err(e) => {
                self.rollback(batch.id).await;
                return Err(e);
            }
        };
        let total = files.len();
        info!("Batch {}: converting {} file(s)", batch.id, total);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        // ── Step 4 + 5: Convert and join ─────────────────────────────────
        let results = self.convert_all(batch.id, files).await;
        if let Some(e) = results.into_iter().find_map(Result::err) {
            error!("Batch {}: aborted by storage failure: {}", batch.id, e);
            return Err(e);
        }

        // ── Step 6: Finalize ─────────────────────────────────────────────
        let files = self.store.files_for_batch(batch.id).await?;
        let converted = files.iter().filter(|f| f.status == FileStatus::Converted).count();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, converted);
        }

        batch.finalize(&files, self.config.aggregate_batch_errors)?;
        self.store.update_batch(&batch).await?;

        info!(
            "Batch {} {}: {}/{} converted in {}ms",
            batch.id,
            batch.status,
            converted,
            total,
            started.elapsed().as_millis()
        );

        Ok(BatchDetail { batch, files })
    }

    /// One batch with its files in upload order.
    pub async fn get_batch(&self, id: BatchId) -> Result<BatchDetail, Doc2MdError> {
        let batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or(Doc2MdError::BatchNotFound(id))?;
        let files = self.store.files_for_batch(id).await?;
        Ok(BatchDetail { batch, files })
    }

    /// The `recent_batches_limit` newest batches, newest first.
    pub async fn list_batches(&self) -> Result<Vec<BatchDetail>, Doc2MdError> {
        let batches = self.store.recent_batches(self.config.recent_batches_limit).await?;
        let mut out = Vec::with_capacity(batches.len());
        for batch in batches {
            let files = self.store.files_for_batch(batch.id).await?;
            out.push(BatchDetail { batch, files });
        }
        Ok(out)
    }

    pub async fn get_file(&self, id: FileId) -> Result<FileRecord, Doc2MdError> {
        self.store
            .get_file(id)
            .await?
            .ok_or(Doc2MdError::FileNotFound(id))
    }

    /// The stored Markdown of a converted file.
    ///
    /// # Errors
    /// [`Doc2MdError::NotConverted`] while the file is anything but `Converted`.
    pub async fn markdown_for_file(&self, id: FileId) -> Result<MarkdownDownload, Doc2MdError> {
        let file = self.get_file(id).await?;
        match file.markdown_content {
            Some(ref content) if file.status == FileStatus::Converted => Ok(MarkdownDownload {
                filename: file.markdown_filename(),
                content: content.clone(),
            }),
            _ => Err(Doc2MdError::NotConverted(id)),
        }
    }

    /// ZIP every converted file of the batch. Partial or empty batches are fine.
    pub async fn build_archive(&self, id: BatchId) -> Result<ArchiveOutput, Doc2MdError> {
        let detail = self.get_batch(id).await?;
        let out = tokio::task::spawn_blocking(move || archive::build_archive(detail.batch.id, &detail.files))
            .await
            .map_err(|e| Doc2MdError::Internal(format!("archive task: {e}")))??;
        debug!("Batch {}: archive {} ({} bytes)", id, out.filename, out.bytes.len());
        Ok(out)
    }

    /// Remove the batch, its files, and both on-disk namespaces.
    ///
    /// # Errors
    /// [`Doc2MdError::BatchInProgress`] while the batch is not yet terminal;
    /// its upload request still owns the records and output directories.
    pub async fn delete_batch(&self, id: BatchId) -> Result<(), Doc2MdError> {
        let batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or(Doc2MdError::BatchNotFound(id))?;
        if !batch.status.is_terminal() {
            return Err(Doc2MdError::BatchInProgress(id));
        }
        if !self.store.delete_batch(id).await? {
            return Err(Doc2MdError::BatchNotFound(id));
        }
        self.layout.remove_batch(id).await?;
        info!("Batch {} deleted", id);
        Ok(())
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn persist_uploads(
        &self,
        batch: &Batch,
        uploads: Vec<ValidatedUpload>,
    ) -> Result<Vec<FileRecord>, Doc2MdError> {
        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = safe_filename(&upload.name);
            let mut record = FileRecord::new(batch.id, name, upload.format, upload.content, PathBuf::new());
            record.source_path = self
                .layout
                .upload_path(batch.id, record.id, &record.original_filename);

            if let Some(parent) = record.source_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Doc2MdError::io(parent, e))?;
            }
            tokio::fs::write(&record.source_path, &record.original_content)
                .await
                .map_err(|e| Doc2MdError::io(&record.source_path, e))?;

            self.store.insert_file(&record).await?;
            files.push(record);
        }
        Ok(files)
    }

    async fn convert_all(&self, batch: BatchId, files: Vec<FileRecord>) -> Vec<Result<FileRecord, Doc2MdError>> {
        let total = files.len();
        let jobs = files.into_iter().enumerate().map(|(i, file)| {
            let index = i + 1;
            let pandoc = self.pandoc.clone();
            let store = Arc::clone(&self.store);
            let out_dir = self.layout.output_dir(batch, file.id);
            let callback = self.config.progress_callback.clone();
            async move {
                let name = file.original_filename.clone();
                if let Some(ref cb) = callback {
                    cb.on_file_start(index, total, &name);
                }

                let result = convert_file(&pandoc, store.as_ref(), file, &out_dir).await;

                if let Some(ref cb) = callback {
                    match result {
                        Ok(ref f) if f.status == FileStatus::Converted => cb.on_file_complete(
                            index,
                            total,
                            &name,
                            f.markdown_content.as_ref().map_or(0, String::len),
                        ),
                        Ok(ref f) => cb.on_file_error(
                            index,
                            total,
                            &name,
                            f.error_message.as_deref().unwrap_or("unknown error"),
                        ),
                        Err(ref e) => cb.on_file_error(index, total, &name, &e.to_string()),
                    }
                }
                result
            }
        });

        stream::iter(jobs)
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Undo a half-persisted upload.
    async fn rollback(&self, batch: BatchId) {
        if let Err(e) = self.store.delete_batch(batch).await {
            warn!("Batch {}: rollback of records failed: {}", batch, e);
        }
        if let Err(e) = self.layout.remove_batch(batch).await {
            warn!("Batch {}: rollback of uploads failed: {}", batch, e);
        }
    }
}
