//! Driver for an external incremental compiler subprocess, the "frontend
//! server".
//!
//! Two modes are offered. [`BatchCompiler`] runs the compiler once, parsing
//! a single result frame from its stdout and skipping the spawn entirely
//! when an input fingerprint matches the previous run. [`CompilerSession`]
//! keeps one compiler process alive and feeds it a serialized sequence of
//! recompile, expression-evaluation, accept, reject, and reset requests
//! over its stdin, pairing each command with the next framed result.
//!
//! The subprocess, the artifact layout, the diagnostic destination, and the
//! fingerprint store are all behind traits so callers (and tests) can
//! substitute their own.

pub mod artifacts;
pub mod cli;
pub mod commands;
pub mod compiler;
pub mod diagnostics;
pub mod fingerprint;
pub mod process;
pub mod uri;
pub mod utils;

pub use compiler::{
    BatchCompiler, BatchOptions, CompilerOutput, CompilerSession, ExpressionRequest,
    RecompileRequest, SessionConfig, TargetModel,
};
pub use utils::DriverError;
