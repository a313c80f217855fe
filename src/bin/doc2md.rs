//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate: `serve` runs the HTTP API, `convert`
//! pushes local files through the same batch pipeline, `check` probes pandoc.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_doc2md::archive::unique_entry_name;
use edgequake_doc2md::{
    api, BatchConverter, BatchStatus, ConversionConfig, ConversionProgressCallback, FileStatus,
    ProgressCallback, UploadCandidate,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a live bar plus one log line per file. Files may finish out of
/// order when `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking pandoc…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, name: &str, markdown_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{markdown_len:>7} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs(index);

        let msg: String = if error.chars().count() > 80 {
            let mut short: String = error.chars().take(79).collect();
            short.push('\u{2026}');
            short
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {:<32}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, converted: usize) {
        self.bar.finish_and_clear();
        let failed = total_files.saturating_sub(converted);
        if failed == 0 {
            eprintln!("{} {} file(s) converted", green("✔"), bold(&converted.to_string()));
        } else {
            eprintln!(
                "{} {}/{} file(s) converted  ({} failed)",
                if converted == 0 { red("✘") } else { cyan("⚠") },
                bold(&converted.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 8000
  doc2md serve --bind 0.0.0.0:8000 --media-root /var/lib/doc2md

  # Convert local files into ./out
  doc2md convert report.doc minutes.docx -o out

  # Convert and also bundle the results
  doc2md convert *.doc -o out --zip out/all.zip

  # Is pandoc usable?
  doc2md check

HTTP API:
  GET    /api/check-pandoc/          {"pandoc_installed": bool, "message": "..."}
  POST   /api/upload/                multipart field "files", up to --max-files documents
  GET    /api/batches/               20 most recent batches, newest first
  GET    /api/batch/{id}/            one batch with its files
  DELETE /api/batch/{id}/            remove a batch and its stored files
  GET    /api/batch/{id}/download/   converted_files_{id}.zip
  GET    /api/file/{id}/download/    one converted Markdown file

ENVIRONMENT VARIABLES:
  PANDOC_PATH          Absolute path to pandoc; wins over --pandoc
  DOC2MD_PANDOC        Same as --pandoc
  DOC2MD_MEDIA_ROOT    Same as --media-root
  DOC2MD_BIND          Same as --bind
  DOC2MD_MAX_FILES     Same as --max-files
  RUST_LOG             Log filter, e.g. edgequake_doc2md=debug,tower_http=debug
"#;

/// Convert legacy Word documents to Markdown through pandoc.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert .doc/.docx documents to Markdown through pandoc",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Convert local files through the batch pipeline.
    Convert(ConvertArgs),
    /// Report whether pandoc can be run.
    Check(CheckArgs),
}

/// Knobs shared by `serve` and `convert`.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// pandoc executable name or path.
    #[arg(long, env = "DOC2MD_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// Maximum files per batch.
    #[arg(long, env = "DOC2MD_MAX_FILES", default_value_t = 10)]
    max_files: usize,

    /// Maximum bytes per file.
    #[arg(long, env = "DOC2MD_MAX_FILE_BYTES", default_value_t = edgequake_doc2md::config::DEFAULT_MAX_FILE_BYTES)]
    max_file_bytes: u64,

    /// Timeout for .doc → .docx, in seconds.
    #[arg(long, env = "DOC2MD_LEGACY_TIMEOUT", default_value_t = 60)]
    legacy_timeout: u64,

    /// Timeout for .docx → Markdown, in seconds.
    #[arg(long, env = "DOC2MD_MARKDOWN_TIMEOUT", default_value_t = 120)]
    markdown_timeout: u64,

    /// Files converted at once within a batch.
    #[arg(short, long, env = "DOC2MD_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Summarise per-file errors in the batch error message.
    #[arg(long, env = "DOC2MD_AGGREGATE_ERRORS")]
    aggregate_errors: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "DOC2MD_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Where uploads and converted output are stored.
    #[arg(long, env = "DOC2MD_MEDIA_ROOT", default_value = "media")]
    media_root: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// .doc / .docx files to convert.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the Markdown files.
    #[arg(short, long, env = "DOC2MD_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Also write every converted file into this ZIP.
    #[arg(long)]
    zip: Option<PathBuf>,

    /// Keep uploads and pandoc output here instead of a temporary directory.
    #[arg(long, env = "DOC2MD_MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// Print the batch as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2MD_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// pandoc executable name or path.
    #[arg(long, env = "DOC2MD_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// Print the probe result as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `convert`.
    let show_progress = matches!(
        cli.command,
        Command::Convert(ref a) if !a.no_progress && !a.json
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Convert(args) => convert(args, show_progress, cli.quiet).await,
        Command::Check(args) => check(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<ExitCode> {
    tokio::fs::create_dir_all(&args.media_root)
        .await
        .with_context(|| format!("Failed to create media root {}", args.media_root.display()))?;

    let config = build_config(&args.pipeline, args.media_root.clone(), None)?;
    let converter = Arc::new(BatchConverter::in_memory(config));

    let tool = converter.check_tool().await;
    if tool.installed {
        info!("{} at {}", tool.version.as_deref().unwrap_or("pandoc"), tool.program.display());
    } else {
        tracing::warn!("{} Uploads will be refused with 503.", tool.message());
    }

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("doc2md listening on http://{}", args.bind);
    info!("Media root: {}", converter.layout().root().display());

    axum::serve(listener, api::router(converter))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(ExitCode::SUCCESS)
}

async fn convert(args: ConvertArgs, show_progress: bool, quiet: bool) -> Result<ExitCode> {
    // Without --media-root the uploads and pandoc scratch space vanish on exit.
    let (media_root, _scratch) = match args.media_root {
        Some(ref root) => (root.clone(), None),
        None => {
            let tmp = tempfile::tempdir().context("Failed to create scratch directory")?;
            (tmp.path().to_path_buf(), Some(tmp))
        }
    };

    let progress: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args.pipeline, media_root, progress)?;
    let converter = BatchConverter::in_memory(config);

    let mut candidates = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        candidates.push(UploadCandidate::new(name, content));
    }

    let detail = converter
        .create_batch(candidates)
        .await
        .context("Conversion failed")?;

    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let mut taken = HashSet::new();
    for file in detail.converted_files() {
        let Some(ref markdown) = file.markdown_content else {
            continue;
        };
        let target = args.output.join(unique_entry_name(&file.markdown_filename(), &mut taken));
        tokio::fs::write(&target, markdown)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        if !quiet && !show_progress && !args.json {
            eprintln!("{} {} → {}", green("✓"), file.original_filename, target.display());
        }
    }

    if let Some(ref zip_path) = args.zip {
        let archive = converter
            .build_archive(detail.batch.id)
            .await
            .context("Failed to build archive")?;
        tokio::fs::write(zip_path, &archive.bytes)
            .await
            .with_context(|| format!("Failed to write {}", zip_path.display()))?;
        if !quiet && !args.json {
            eprintln!("{} archive → {}", green("✓"), bold(&zip_path.display().to_string()));
        }
    }

    if args.json {
        let view = api::types::BatchView::from(&detail);
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("Failed to serialise batch")?
        );
    } else if !quiet {
        for file in detail.files.iter().filter(|f| f.status == FileStatus::Failed) {
            eprintln!(
                "{} {}: {}",
                red("✗"),
                file.original_filename,
                file.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(if detail.batch.status == BatchStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn check(args: CheckArgs) -> Result<ExitCode> {
    let located = pandoc_locate::locate(&args.pandoc);
    let config = ConversionConfig::builder()
        .pandoc_path(&args.pandoc)
        .build()
        .context("Invalid configuration")?;
    let status = BatchConverter::in_memory(config).check_tool().await;

    if args.json {
        let view = api::types::ToolCheckView::from(&status);
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("Failed to serialise probe")?
        );
    } else if status.installed {
        println!(
            "{} {}  {}",
            green("✔"),
            status.version.as_deref().unwrap_or("pandoc"),
            dim(&status.program.display().to_string())
        );
    } else {
        println!("{} {}", red("✘"), status.message());
        if let Err(e) = located {
            println!("  {}", dim(&e.to_string()));
        }
    }

    Ok(if status.installed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    args: &PipelineArgs,
    media_root: PathBuf,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .pandoc_path(&args.pandoc)
        .media_root(media_root)
        .max_files(args.max_files)
        .max_file_bytes(args.max_file_bytes)
        .legacy_timeout_secs(args.legacy_timeout)
        .markdown_timeout_secs(args.markdown_timeout)
        .concurrency(args.concurrency)
        .aggregate_batch_errors(args.aggregate_errors);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
