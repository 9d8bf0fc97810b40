//! Script module - generation of runtime programs
//!
//! Turns tasks, credential probes, and dependency checks into Python source
//! with all untrusted text embedded as inert literals.

pub mod generator;
pub mod literal;

pub use generator::{ScriptGenerator, ERROR_MARKER, SUCCESS_MARKER};
pub use literal::py_str;
