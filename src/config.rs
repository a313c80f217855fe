//! Configuration types for batch document conversion.
//!
//! All service behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Upload limits, converter timeouts, the
//! media root, and the injected subprocess runner all live here so the HTTP
//! layer, the CLI and tests share exactly one knob set.

use crate::error::Doc2MdError;
use crate::pipeline::runner::CommandRunner;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default per-file upload limit: 10 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for the conversion service.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .media_root("/var/lib/doc2md")
///     .max_files(5)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_files, 5);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Converter executable. Default: `pandoc`. `PANDOC_PATH` overrides it at spawn time.
    pub pandoc_path: PathBuf,

    /// Root directory for `uploads/<batch>/…` and `converted/<batch>/…`. Default: `./media`.
    pub media_root: PathBuf,

    /// Maximum files per upload request. Default: 10.
    pub max_files: usize,

    /// Maximum bytes per uploaded file. Default: 10 MiB.
    pub max_file_bytes: u64,

    /// Timeout for the `.doc` → `.docx` stage in seconds. Default: 60.
    pub legacy_timeout_secs: u64,

    /// Timeout for the `.docx` → Markdown stage in seconds. Default: 120.
    ///
    /// Longer than the first stage because pandoc also extracts embedded media.
    pub markdown_timeout_secs: u64,

    /// Timeout for the `pandoc --version` availability probe. Default: 10.
    pub probe_timeout_secs: u64,

    /// How many batches the "recent batches" listing returns. Default: 20.
    pub recent_batches_limit: usize,

    /// Files converted at once within a batch. Default: 1 (sequential).
    ///
    /// Files are independent, so raising this is safe; each file is still
    /// written by exactly one task and the batch is finalised after all of
    /// them join.
    pub concurrency: usize,

    /// Fold per-file errors into the batch `error_message` when a batch fails. Default: false.
    pub aggregate_batch_errors: bool,

    /// Pre-constructed subprocess runner. Defaults to spawning real processes.
    pub runner: Option<Arc<dyn CommandRunner>>,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            pandoc_path: PathBuf::from("pandoc"),
            media_root: PathBuf::from("media"),
            max_files: 10,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            legacy_timeout_secs: 60,
            markdown_timeout_secs: 120,
            probe_timeout_secs: 10,
            recent_batches_limit: 20,
            concurrency: 1,
            aggregate_batch_errors: false,
            runner: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("pandoc_path", &self.pandoc_path)
            .field("media_root", &self.media_root)
            .field("max_files", &self.max_files)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("legacy_timeout_secs", &self.legacy_timeout_secs)
            .field("markdown_timeout_secs", &self.markdown_timeout_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("recent_batches_limit", &self.recent_batches_limit)
            .field("concurrency", &self.concurrency)
            .field("aggregate_batch_errors", &self.aggregate_batch_errors)
            .field("runner", &self.runner.as_ref().map(|_| "<dyn CommandRunner>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn media_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.media_root = path.into();
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = n;
        self
    }

    pub fn max_file_bytes(mut self, n: u64) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn legacy_timeout_secs(mut self, secs: u64) -> Self {
        self.config.legacy_timeout_secs = secs;
        self
    }

    pub fn markdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.markdown_timeout_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn recent_batches_limit(mut self, n: usize) -> Self {
        self.config.recent_batches_limit = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn aggregate_batch_errors(mut self, v: bool) -> Self {
        self.config.aggregate_batch_errors = v;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.config.runner = Some(runner);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Doc2MdError> {
        let c = &self.config;
        if c.max_files == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "max_files must be ≥ 1".into(),
            ));
        }
        if c.max_file_bytes == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "max_file_bytes must be ≥ 1".into(),
            ));
        }
        if c.legacy_timeout_secs == 0 || c.markdown_timeout_secs == 0 || c.probe_timeout_secs == 0 {
            return Err(Doc2MdError::InvalidConfig(format!(
                "timeouts must be ≥ 1s, got legacy={} markdown={} probe={}",
                c.legacy_timeout_secs, c.markdown_timeout_secs, c.probe_timeout_secs
            )));
        }
        if c.pandoc_path.as_os_str().is_empty() {
            return Err(Doc2MdError::InvalidConfig(
                "pandoc_path must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
