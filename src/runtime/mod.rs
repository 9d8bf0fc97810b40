//! Runtime module - the external interpreter process
//!
//! Runs generated scripts as supervised subprocesses and probes the runtime
//! for the libraries those scripts need.

mod probe;
mod result;
mod runner;

pub use probe::{DependencyStatus, EnvironmentProbe, REQUIRED_MODULES};
pub use result::{Marker, RunFailure, RunResult, Termination};
pub use runner::{EnvOverrides, ProcessRunner, ScriptRunner};
