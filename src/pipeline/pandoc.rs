//! pandoc adapter: availability probe plus the two transcoding stages.
//!
//! ```text
//! report.doc ──doc_to_docx()──▶ report.docx ──docx_to_markdown()──▶ report.md + media/
//!             (60 s bound)                    (120 s bound, --wrap=none)
//! ```
//!
//! Every call goes through the configured [`CommandRunner`], so nothing here
//! spawns a process directly. A non-zero exit becomes
//! [`ConversionError::ToolFailed`] carrying pandoc's stderr; an elapsed bound
//! becomes [`ConversionError::Timeout`].

use crate::config::ConversionConfig;
use crate::error::{ConversionError, Stage};
use crate::pipeline::runner::{
    CommandRunner, RunnerError, TokioCommandRunner, ToolInvocation, ToolOutput,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Output of the Markdown stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownArtifact {
    /// `<out_dir>/<stem>.md`
    pub path: PathBuf,
    /// `<out_dir>/media`, where pandoc extracts embedded images.
    pub media_dir: PathBuf,
}

/// Thin wrapper around the pandoc executable.
#[derive(Clone)]
pub struct Pandoc {
    program: PathBuf,
    runner: Arc<dyn CommandRunner>,
    legacy_timeout: Duration,
    markdown_timeout: Duration,
    probe_timeout: Duration,
}

impl std::fmt::Debug for Pandoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pandoc")
            .field("program", &self.program)
            .field("legacy_timeout", &self.legacy_timeout)
            .field("markdown_timeout", &self.markdown_timeout)
            .finish()
    }
}

impl Pandoc {
    /// Build the adapter from config, falling back to [`TokioCommandRunner`].
    pub fn from_config(config: &ConversionConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = match config.runner {
            Some(ref r) => Arc::clone(r),
            None => Arc::new(TokioCommandRunner),
        };
        Self {
            program: pandoc_locate::resolve_program(&config.pandoc_path),
            runner,
            legacy_timeout: Duration::from_secs(config.legacy_timeout_secs),
            markdown_timeout: Duration::from_secs(config.markdown_timeout_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `pandoc --version` exits 0.
    pub async fn is_available(&self) -> bool {
        self.version().await.is_some()
    }

    /// First line of `pandoc --version`, e.g. `pandoc 3.1.11`.
    pub async fn version(&self) -> Option<String> {
        let inv = ToolInvocation::new(&self.program, self.probe_timeout).arg("--version");
        match self.runner.run(&inv).await {
            Ok(out) if out.success() => Some(
                out.stdout
                    .lines()
                    .next()
                    .unwrap_or("pandoc")
                    .trim()
                    .to_string(),
            ),
            Ok(out) => {
                debug!("pandoc probe exited {:?}: {}", out.exit_code, out.diagnostic());
                None
            }
            Err(e) => {
                debug!("pandoc probe failed: {}", e);
                None
            }
        }
    }

    /// `<out_dir>/<stem>.docx`, the path [`Pandoc::doc_to_docx`] writes to.
    pub fn intermediate_path(source: &Path, out_dir: &Path) -> PathBuf {
        out_dir.join(format!("{}.docx", stem_of(source)))
    }

    /// Transcode a legacy `.doc` into `<out_dir>/<stem>.docx`.
    pub async fn doc_to_docx(&self, source: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        let output = Self::intermediate_path(source, out_dir);
        let inv = ToolInvocation::new(&self.program, self.legacy_timeout)
            .arg(source)
            .arg("-o")
            .arg(&output)
            .current_dir(out_dir);

        self.run_stage(Stage::Intermediate, &inv).await?;
        Ok(output)
    }

    /// Transcode `.docx` into `<out_dir>/<stem>.md`, extracting media and
    /// leaving long lines unwrapped.
    pub async fn docx_to_markdown(
        &self,
        source: &Path,
        out_dir: &Path,
    ) -> Result<MarkdownArtifact, ConversionError> {
        let path = out_dir.join(format!("{}.md", stem_of(source)));
        let media_dir = out_dir.join("media");
        let inv = ToolInvocation::new(&self.program, self.markdown_timeout)
            .arg(source)
            .arg("-f")
            .arg("docx")
            .arg("-t")
            .arg("markdown")
            .arg("-o")
            .arg(&path)
            .arg("--wrap=none")
            .arg("--extract-media")
            .arg(&media_dir)
            .current_dir(out_dir);

        self.run_stage(Stage::Markdown, &inv).await?;
        Ok(MarkdownArtifact { path, media_dir })
    }

    async fn run_stage(&self, stage: Stage, inv: &ToolInvocation) -> Result<ToolOutput, ConversionError> {
        match self.runner.run(inv).await {
            Ok(out) if out.success() => Ok(out),
            Ok(out) => {
                warn!("{}: pandoc exited {:?}", stage, out.exit_code);
                Err(ConversionError::ToolFailed {
                    stage,
                    detail: out.diagnostic(),
                })
            }
            Err(RunnerError::Timeout { timeout }) => {
                warn!("{}: pandoc timed out after {:?}", stage, timeout);
                Err(ConversionError::Timeout {
                    stage,
                    secs: timeout.as_secs(),
                })
            }
            Err(e) => Err(ConversionError::SpawnFailed {
                stage,
                detail: e.to_string(),
            }),
        }
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
