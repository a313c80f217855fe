//! Subprocess execution behind a trait so the converter can be faked.
//!
//! [`CommandRunner`] is the only place the crate spawns processes. The pandoc
//! adapter builds a [`ToolInvocation`] (program, args, working directory,
//! timeout) and hands it to whichever runner the config carries: the real
//! [`TokioCommandRunner`] in production, a scripted fake in tests.
//!
//! ## Timeouts
//!
//! The timeout is a hard bound, not a cooperative signal. When it elapses the
//! `wait` future is dropped, and `kill_on_drop(true)` makes tokio kill the
//! child so a hung pandoc never outlives its file's conversion.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One external-tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The value following `flag`, e.g. the output path after `-o`.
    pub fn arg_after(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
    }

    /// Lossy, space-joined rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the process left behind once it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stderr if it says anything, otherwise stdout, otherwise the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Why a process produced no [`ToolOutput`].
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },
}

/// Run an external tool with args, working directory and timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RunnerError>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RunnerError> {
        let program = invocation.program.to_string_lossy().into_owned();
        debug!("spawn: {} (timeout {:?})", invocation.display(), invocation.timeout);

        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = invocation.cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

        match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let out = ToolOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                debug!("exit: {} → {:?}", program, out.exit_code);
                Ok(out)
            }
            Ok(Err(source)) => Err(RunnerError::Wait { program, source }),
            Err(_) => Err(RunnerError::Timeout {
                timeout: invocation.timeout,
            }),
        }
    }
}
