//! # edgequake-doc2md
//!
//! Batch-convert legacy Word documents (`.doc` / `.docx`) to Markdown through
//! [pandoc](https://pandoc.org), as a library, an HTTP service, or a CLI.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (1..=10 files)
//!  │
//!  ├─ 1. Probe     pandoc --version, else 503 before anything is stored
//!  ├─ 2. Validate  count, extension, 10 MiB per file
//!  ├─ 3. Persist   batch + file records, raw bytes under uploads/<batch>/
//!  ├─ 4. Convert   per file: .doc ─▶ .docx ─▶ .md (+ media/), isolated failures
//!  ├─ 5. Finalize  Completed iff every file converted, else Failed
//!  └─ 6. Export    single .md download or converted_files_<batch>.zip
//! ```
//!
//! A batch that partially fails is still a successful request: its status is
//! `failed` and each file carries its own error message.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{BatchConverter, ConversionConfig, UploadCandidate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().media_root("./media").build()?;
//!     let converter = BatchConverter::in_memory(config);
//!
//!     let bytes = std::fs::read("report.docx")?;
//!     let detail = converter
//!         .create_batch(vec![UploadCandidate::new("report.docx", bytes)])
//!         .await?;
//!
//!     println!("batch {} is {}", detail.batch.id, detail.batch.status);
//!     for file in &detail.files {
//!         println!("{} → {:?}", file.original_filename, file.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Serving over HTTP
//!
//! ```rust,no_run
//! use edgequake_doc2md::{api, BatchConverter, ConversionConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = Arc::new(BatchConverter::in_memory(ConversionConfig::default()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, api::router(converter)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::router;
pub use archive::{archive_filename, build_archive, ArchiveOutput};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{BatchConverter, MarkdownDownload, ToolStatus};
pub use error::{ConversionError, Doc2MdError, Stage, ValidationError};
pub use model::{
    markdown_filename, Batch, BatchDetail, BatchId, BatchStatus, DocumentFormat, FileId,
    FileRecord, FileStatus,
};
pub use pipeline::runner::{CommandRunner, RunnerError, TokioCommandRunner, ToolInvocation, ToolOutput};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{BatchStore, MediaLayout, MemoryStore};
pub use validate::{validate_upload, UploadCandidate, ValidatedUpload};
