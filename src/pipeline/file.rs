//! Conversion of a single uploaded file.
//!
//! [`convert_file`] takes a record in `Uploaded` status and always hands it
//! back terminal: `Converted` with its Markdown, or `Failed` with the error
//! text. Converter errors never escape as `Err`; only store failures do.
//!
//! The intermediate `.docx` produced for legacy `.doc` input is removed on
//! every exit path, including timeouts that leave a partial file behind.

use crate::error::{ConversionError, Doc2MdError};
use crate::model::FileRecord;
use crate::pipeline::pandoc::Pandoc;
use crate::store::BatchStore;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Convert `file` into `out_dir`, persisting every status change.
pub async fn convert_file(
    pandoc: &Pandoc,
    store: &dyn BatchStore,
    mut file: FileRecord,
    out_dir: &Path,
) -> Result<FileRecord, Doc2MdError> {
    file.mark_converting()?;
    store.update_file(&file).await?;

    let intermediate = file
        .format
        .needs_intermediate()
        .then(|| Pandoc::intermediate_path(&file.source_path, out_dir));

    let outcome = run_stages(pandoc, &file, out_dir, intermediate.as_deref()).await;

    if let Some(ref path) = intermediate {
        discard(path).await;
    }

    match outcome {
        Ok((markdown, path)) => {
            debug!("{} → {} ({} bytes)", file.original_filename, path.display(), markdown.len());
            file.mark_converted(markdown, path)?;
        }
        Err(e) => {
            warn!("Conversion of {} failed: {}", file.original_filename, e);
            file.mark_failed(e.to_string())?;
        }
    }
    store.update_file(&file).await?;
    Ok(file)
}

async fn run_stages(
    pandoc: &Pandoc,
    file: &FileRecord,
    out_dir: &Path,
    intermediate: Option<&Path>,
) -> Result<(String, PathBuf), ConversionError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| ConversionError::Workspace {
            detail: format!("{}: {}", out_dir.display(), e),
        })?;

    let docx = match intermediate {
        Some(_) => pandoc.doc_to_docx(&file.source_path, out_dir).await?,
        None => file.source_path.clone(),
    };

    let artifact = pandoc.docx_to_markdown(&docx, out_dir).await?;
    let markdown = tokio::fs::read_to_string(&artifact.path)
        .await
        .map_err(|e| ConversionError::OutputUnreadable {
            path: artifact.path.clone(),
            detail: e.to_string(),
        })?;
    Ok((markdown, artifact.path))
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed intermediate {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove intermediate {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::model::{Batch, DocumentFormat, FileStatus};
    use crate::pipeline::runner::{CommandRunner, RunnerError, ToolInvocation, ToolOutput};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;

    /// Runner driven by a closure; the closure sees each invocation.
    struct FnRunner<F>(F);

    #[async_trait]
    impl<F> CommandRunner for FnRunner<F>
    where
        F: Fn(&ToolInvocation) -> Result<ToolOutput, RunnerError> + Send + Sync,
    {
        async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RunnerError> {
            (self.0)(invocation)
        }
    }

    fn ok() -> Result<ToolOutput, RunnerError> {
        Ok(ToolOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }

    /// Writes something to the `-o` target, like pandoc would.
    fn write_output(inv: &ToolInvocation) {
        let out = inv.arg_after("-o").expect("-o present");
        std::fs::write(out, "# Title\n\nBody text.\n").unwrap();
    }

    fn pandoc_with<F>(f: F) -> Pandoc
    where
        F: Fn(&ToolInvocation) -> Result<ToolOutput, RunnerError> + Send + Sync + 'static,
    {
        let config = ConversionConfig::builder()
            .runner(Arc::new(FnRunner(f)))
            .build()
            .unwrap();
        Pandoc::from_config(&config)
    }

    async fn uploaded(store: &MemoryStore, dir: &Path, name: &str) -> FileRecord {
        let batch = Batch::new();
        store.insert_batch(&batch).await.unwrap();
        let source = dir.join(name);
        std::fs::write(&source, b"raw").unwrap();
        let f = FileRecord::new(
            batch.id,
            name,
            DocumentFormat::from_filename(name).unwrap(),
            Bytes::from_static(b"raw"),
            source,
        );
        store.insert_file(&f).await.unwrap();
        f
    }

    #[tokio::test]
    async fn docx_skips_intermediate_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let f = uploaded(&store, tmp.path(), "Report.docx").await;
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let pandoc = pandoc_with(move |inv| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            write_output(inv);
            ok()
        });

        let out_dir = tmp.path().join("out");
        let done = convert_file(&pandoc, &store, f, &out_dir).await.unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(done.status, FileStatus::Converted);
        assert_eq!(done.markdown_content.as_deref(), Some("# Title\n\nBody text.\n"));
        assert_eq!(done.converted_path, Some(out_dir.join("Report.md")));

        let stored = store.get_file(done.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Converted);
    }

    #[tokio::test]
    async fn doc_runs_both_stages_and_removes_intermediate() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let f = uploaded(&store, tmp.path(), "memo.doc").await;
        let pandoc = pandoc_with(|inv| {
            write_output(inv);
            ok()
        });

        let out_dir = tmp.path().join("out");
        let done = convert_file(&pandoc, &store, f, &out_dir).await.unwrap();

        assert_eq!(done.status, FileStatus::Converted);
        assert!(out_dir.join("memo.md").exists());
        assert!(!out_dir.join("memo.docx").exists());
    }

    #[tokio::test]
    async fn timeout_fails_file_and_cleans_partial_intermediate() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let f = uploaded(&store, tmp.path(), "slow.doc").await;
        let pandoc = pandoc_with(|inv| {
            // Leave a half-written .docx behind, then time out.
            write_output(inv);
            Err(RunnerError::Timeout {
                timeout: Duration::from_secs(60),
            })
        });

        let out_dir = tmp.path().join("out");
        let done = convert_file(&pandoc, &store, f, &out_dir).await.unwrap();

        assert_eq!(done.status, FileStatus::Failed);
        let msg = done.error_message.clone().unwrap();
        assert!(msg.contains("timed out"), "got: {msg}");
        assert!(done.markdown_content.is_none());
        assert!(!out_dir.join("slow.docx").exists());

        let stored = store.get_file(done.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Failed);
    }

    #[tokio::test]
    async fn second_stage_failure_still_removes_intermediate() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let f = uploaded(&store, tmp.path(), "broken.doc").await;
        let pandoc = pandoc_with(|inv| {
            if inv.args.iter().any(|a| a == "markdown") {
                return Ok(ToolOutput {
                    exit_code: Some(64),
                    stdout: String::new(),
                    stderr: "couldn't parse docx".into(),
                });
            }
            write_output(inv);
            ok()
        });

        let out_dir = tmp.path().join("out");
        let done = convert_file(&pandoc, &store, f, &out_dir).await.unwrap();

        assert_eq!(done.status, FileStatus::Failed);
        assert!(done.error_message.unwrap().contains("couldn't parse docx"));
        assert!(!out_dir.join("broken.docx").exists());
    }

    #[tokio::test]
    async fn missing_markdown_output_is_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let f = uploaded(&store, tmp.path(), "ghost.docx").await;
        // Exit 0 but write nothing.
        let pandoc = pandoc_with(|_| ok());

        let done = convert_file(&pandoc, &store, f, &tmp.path().join("out")).await.unwrap();
        assert_eq!(done.status, FileStatus::Failed);
        assert!(done.error_message.unwrap().contains("ghost.md"));
    }

    #[tokio::test]
    async fn already_terminal_record_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let mut f = uploaded(&store, tmp.path(), "a.docx").await;
        f.mark_converting().unwrap();
        f.mark_failed("earlier").unwrap();

        let pandoc = pandoc_with(|_| ok());
        let err = convert_file(&pandoc, &store, f, tmp.path()).await.unwrap_err();
        assert!(matches!(err, Doc2MdError::InvalidTransition { .. }));
    }
}
