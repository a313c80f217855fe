//! Per-file conversion pipeline.
//!
//! ## Data Flow
//!
//! ```text
//! FileRecord ──▶ file::convert_file ──▶ pandoc::Pandoc ──▶ runner::CommandRunner
//! (Uploaded)      (status + cleanup)     (stage args,        (spawn, timeout,
//!                                         error mapping)      capture output)
//! ```
//!
//! 1. [`runner`]: the one place processes are spawned; trait so tests can
//!    script pandoc's behaviour
//! 2. [`pandoc`]: builds the two pandoc invocations and the `--version` probe
//! 3. [`file`]: drives one record from `Uploaded` to a terminal status

pub mod file;
pub mod pandoc;
pub mod runner;
