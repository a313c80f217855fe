//! Batch and file persistence.
//!
//! [`BatchStore`] is the only shared mutable state in the service. The
//! orchestrator talks to it through the trait, so swapping the bundled
//! [`MemoryStore`] for a database-backed one touches nothing else.
//!
//! [`MediaLayout`] covers the on-disk half: raw uploads and converted output
//! live in separate per-batch namespaces so one batch can be removed as a unit.
//!
//! ```text
//! <media_root>/
//! ├── uploads/<batch_id>/<file_id>/<original name>
//! └── converted/<batch_id>/<file_id>/{<stem>.md, media/}
//! ```

use crate::error::Doc2MdError;
use crate::model::{Batch, BatchId, FileId, FileRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Create/read/update/list/delete over batches and their files.
///
/// Files of a batch are returned in upload order. Deleting a batch deletes its
/// files.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn insert_batch(&self, batch: &Batch) -> Result<(), Doc2MdError>;

    /// Overwrite an existing batch.
    async fn update_batch(&self, batch: &Batch) -> Result<(), Doc2MdError>;

    /// Fails with [`Doc2MdError::BatchNotFound`] if the owning batch is missing.
    async fn insert_file(&self, file: &FileRecord) -> Result<(), Doc2MdError>;

    /// Overwrite an existing file.
    async fn update_file(&self, file: &FileRecord) -> Result<(), Doc2MdError>;

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, Doc2MdError>;

    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>, Doc2MdError>;

    async fn files_for_batch(&self, id: BatchId) -> Result<Vec<FileRecord>, Doc2MdError>;

    /// Newest first, at most `limit`.
    async fn recent_batches(&self, limit: usize) -> Result<Vec<Batch>, Doc2MdError>;

    /// Returns `false` if the batch did not exist.
    async fn delete_batch(&self, id: BatchId) -> Result<bool, Doc2MdError>;
}

#[derive(Default)]
struct Tables {
    batches: HashMap<BatchId, Batch>,
    files: HashMap<FileId, FileRecord>,
    /// Upload order of each batch's files.
    batch_files: HashMap<BatchId, Vec<FileId>>,
    /// Insertion order; breaks `created_at` ties in listings.
    batch_seq: HashMap<BatchId, u64>,
    next_seq: u64,
}

/// In-process [`BatchStore`]. State is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for MemoryStore {
    async fn insert_batch(&self, batch: &Batch) -> Result<(), Doc2MdError> {
        let mut t = self.tables.write().await;
        if t.batches.contains_key(&batch.id) {
            return Err(Doc2MdError::Storage(format!("batch {} already exists", batch.id)));
        }
        t.batches.insert(batch.id, batch.clone());
        t.batch_files.entry(batch.id).or_default();
        let seq = t.next_seq;
        t.batch_seq.insert(batch.id, seq);
        t.next_seq += 1;
        Ok(())
    }

    async fn update_batch(&self, batch: &Batch) -> Result<(), Doc2MdError> {
        let mut t = self.tables.write().await;
        match t.batches.get_mut(&batch.id) {
            Some(slot) => {
                *slot = batch.clone();
                Ok(())
            }
            None => Err(Doc2MdError::BatchNotFound(batch.id)),
        }
    }

    async fn insert_file(&self, file: &FileRecord) -> Result<(), Doc2MdError> {
        let mut t = self.tables.write().await;
        if !t.batches.contains_key(&file.batch_id) {
            return Err(Doc2MdError::BatchNotFound(file.batch_id));
        }
        if t.files.contains_key(&file.id) {
            return Err(Doc2MdError::Storage(format!("file {} already exists", file.id)));
        }
        t.files.insert(file.id, file.clone());
        t.batch_files.entry(file.batch_id).or_default().push(file.id);
        Ok(())
    }

    async fn update_file(&self, file: &FileRecord) -> Result<(), Doc2MdError> {
        let mut t = self.tables.write().await;
        match t.files.get_mut(&file.id) {
            Some(slot) => {
                *slot = file.clone();
                Ok(())
            }
            None => Err(Doc2MdError::FileNotFound(file.id)),
        }
    }

    async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>, Doc2MdError> {
        Ok(self.tables.read().await.batches.get(&id).cloned())
    }

    async fn get_file(&self, id: FileId) -> Result<Option<FileRecord>, Doc2MdError> {
        Ok(self.tables.read().await.files.get(&id).cloned())
    }

    async fn files_for_batch(&self, id: BatchId) -> Result<Vec<FileRecord>, Doc2MdError> {
        let t = self.tables.read().await;
        Ok(t.batch_files
            .get(&id)
            .map(|ids| ids.iter().filter_map(|fid| t.files.get(fid).cloned()).collect())
            .unwrap_or_default())
    }

    async fn recent_batches(&self, limit: usize) -> Result<Vec<Batch>, Doc2MdError> {
        let t = self.tables.read().await;
        let mut batches: Vec<Batch> = t.batches.values().cloned().collect();
        let seq = |b: &Batch| t.batch_seq.get(&b.id).copied().unwrap_or_default();
        batches.sort_by(|a, b| (b.created_at, seq(b)).cmp(&(a.created_at, seq(a))));
        batches.truncate(limit);
        Ok(batches)
    }

    async fn delete_batch(&self, id: BatchId) -> Result<bool, Doc2MdError> {
        let mut t = self.tables.write().await;
        if t.batches.remove(&id).is_none() {
            return Ok(false);
        }
        t.batch_seq.remove(&id);
        for fid in t.batch_files.remove(&id).unwrap_or_default() {
            t.files.remove(&fid);
        }
        Ok(true)
    }
}

// ── On-disk layout ───────────────────────────────────────────────────────

/// Paths under the media root.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    root: PathBuf,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batch_uploads(&self, batch: BatchId) -> PathBuf {
        self.root.join("uploads").join(batch.to_string())
    }

    pub fn batch_converted(&self, batch: BatchId) -> PathBuf {
        self.root.join("converted").join(batch.to_string())
    }

    /// Where the raw bytes of an upload are written.
    pub fn upload_path(&self, batch: BatchId, file: FileId, name: &str) -> PathBuf {
        self.batch_uploads(batch)
            .join(file.to_string())
            .join(safe_filename(name))
    }

    /// Per-file output directory for pandoc.
    pub fn output_dir(&self, batch: BatchId, file: FileId) -> PathBuf {
        self.batch_converted(batch).join(file.to_string())
    }

    /// Remove both namespaces of a batch. Missing directories are fine.
    pub async fn remove_batch(&self, batch: BatchId) -> Result<(), Doc2MdError> {
        for dir in [self.batch_uploads(batch), self.batch_converted(batch)] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Doc2MdError::io(dir, e)),
            }
        }
        Ok(())
    }
}

/// Last path component of a client-supplied name.
///
/// Clients may send `C:\docs\a.doc` or `../../a.doc`; only `a.doc` is kept.
pub fn safe_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match last {
        "" | "." | ".." => "document".to_string(),
        other => other.to_string(),
    }
}
