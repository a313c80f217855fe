//! Shared fixtures: a scripted pandoc stand-in and converter builders.
//!
//! `ScriptedPandoc` decides what to do from the source file name:
//!
//! | name contains | behaviour |
//! |---------------|-----------|
//! | `timeout`     | writes a partial output, then reports a timeout |
//! | `broken`      | exits 1 with `pandoc: cannot parse broken input` on stderr |
//! | anything else | writes `# <stem>` to the `-o` target and exits 0 |

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_doc2md::{
    BatchConverter, CommandRunner, ConversionConfig, ConversionConfigBuilder, RunnerError,
    ToolInvocation, ToolOutput, UploadCandidate,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct ScriptedPandoc {
    installed: bool,
    calls: Mutex<Vec<ToolInvocation>>,
}

impl ScriptedPandoc {
    pub fn installed() -> Arc<Self> {
        Arc::new(Self {
            installed: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self {
            installed: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations other than the `--version` probe.
    pub fn conversion_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.args.first().map_or(true, |a| a != "--version"))
            .count()
    }
}

/// What the scripted pandoc writes for `stem`.
pub fn expected_markdown(stem: &str) -> String {
    format!("# {stem}\n\nConverted body.\n")
}

#[async_trait]
impl CommandRunner for ScriptedPandoc {
    async fn run(&self, inv: &ToolInvocation) -> Result<ToolOutput, RunnerError> {
        self.calls.lock().unwrap().push(inv.clone());

        if !self.installed {
            return Err(RunnerError::Spawn {
                program: inv.program.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        if inv.args.first().is_some_and(|a| a == "--version") {
            return Ok(ToolOutput {
                exit_code: Some(0),
                stdout: "pandoc 3.1.11\n".into(),
                stderr: String::new(),
            });
        }

        let source = PathBuf::from(inv.args.first().expect("source argument"));
        let source_name = source.file_name().unwrap().to_string_lossy().into_owned();
        let target = PathBuf::from(inv.arg_after("-o").expect("-o argument"));

        if source_name.contains("timeout") {
            std::fs::write(&target, b"partial").unwrap();
            return Err(RunnerError::Timeout {
                timeout: inv.timeout,
            });
        }
        if source_name.contains("broken") {
            return Ok(ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "pandoc: cannot parse broken input\n".into(),
            });
        }

        let stem = target.file_stem().unwrap().to_string_lossy().into_owned();
        std::fs::write(&target, expected_markdown(&stem)).unwrap();
        Ok(ToolOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

pub fn config_with(root: &Path, runner: Arc<ScriptedPandoc>) -> ConversionConfigBuilder {
    ConversionConfig::builder()
        .media_root(root)
        .runner(runner)
        .legacy_timeout_secs(60)
        .markdown_timeout_secs(120)
}

pub fn converter(root: &Path, runner: Arc<ScriptedPandoc>) -> BatchConverter {
    BatchConverter::in_memory(config_with(root, runner).build().unwrap())
}

pub fn upload(name: &str) -> UploadCandidate {
    UploadCandidate::new(name, format!("raw bytes of {name}").into_bytes())
}

/// Every file path under `dir`, recursively.
pub fn walk(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out
}
