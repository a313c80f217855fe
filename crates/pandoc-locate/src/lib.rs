//! # pandoc-locate
//!
//! Resolve the [pandoc](https://pandoc.org/) executable that
//! `edgequake-doc2md` shells out to.
//!
//! ## How it works
//!
//! 1. If `PANDOC_PATH` is set (and non-empty) it wins over everything else.
//! 2. Otherwise the configured program (default `pandoc`) is used.
//! 3. [`locate`] additionally checks the result on disk: a bare program name
//!    is searched on `PATH`, anything containing a path separator must exist.
//!
//! [`resolve_program`] never touches the file system, so it is cheap enough to
//! call on every subprocess spawn. [`locate`] is what diagnostics (`doc2md
//! check`) use to print where the binary actually lives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pandoc_locate::{locate, resolve_program};
//! use std::path::Path;
//!
//! let program = resolve_program(Path::new("pandoc"));
//! match locate(Path::new("pandoc")) {
//!     Ok(path) => println!("pandoc at {}", path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # let _ = program;
//! ```
//!
//! ## Environment variable overrides
//!
//! - `PANDOC_PATH`: path to a specific pandoc binary.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the configured program.
pub const PANDOC_PATH_ENV: &str = "PANDOC_PATH";

/// Errors returned by [`locate`].
#[derive(Error, Debug)]
pub enum LocateError {
    /// `PANDOC_PATH` points at something that is not an executable file.
    #[error("PANDOC_PATH='{}' does not point to an executable file", .path.display())]
    OverrideMissing { path: PathBuf },

    /// An explicit path was configured but nothing executable lives there.
    #[error("pandoc not found at '{}'", .path.display())]
    PathMissing { path: PathBuf },

    /// A bare program name was not found on any `PATH` entry.
    #[error("'{program}' was not found on PATH.\nInstall pandoc (https://pandoc.org/installing.html) or set PANDOC_PATH.")]
    NotOnPath { program: String },
}

/// The program to spawn: `PANDOC_PATH` if set, otherwise `configured`.
pub fn resolve_program(configured: &Path) -> PathBuf {
    resolve_with(configured, std::env::var_os(PANDOC_PATH_ENV))
}

/// Resolve the program and confirm it exists.
///
/// Bare names (`pandoc`) are looked up on `PATH`; anything with a directory
/// component is checked as-is.
pub fn locate(configured: &Path) -> Result<PathBuf, LocateError> {
    let override_var = std::env::var_os(PANDOC_PATH_ENV).filter(|v| !v.is_empty());
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    locate_with(configured, override_var, &path_var)
}

fn resolve_with(configured: &Path, override_var: Option<OsString>) -> PathBuf {
    match override_var {
        Some(v) if !v.is_empty() => PathBuf::from(v),
        _ => configured.to_path_buf(),
    }
}

fn locate_with(
    configured: &Path,
    override_var: Option<OsString>,
    path_var: &OsStr,
) -> Result<PathBuf, LocateError> {
    if let Some(v) = override_var {
        let path = PathBuf::from(v);
        return if is_executable(&path) {
            Ok(path)
        } else {
            Err(LocateError::OverrideMissing { path })
        };
    }

    if configured.components().count() > 1 || configured.is_absolute() {
        return if is_executable(configured) {
            Ok(configured.to_path_buf())
        } else {
            Err(LocateError::PathMissing {
                path: configured.to_path_buf(),
            })
        };
    }

    search_path(configured.as_os_str(), path_var).ok_or_else(|| LocateError::NotOnPath {
        program: configured.to_string_lossy().into_owned(),
    })
}

/// Walk every `PATH` entry looking for `program` (plus `.exe` on Windows).
fn search_path(program: &OsStr, path_var: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(path_var) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if is_executable(&exe) {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
