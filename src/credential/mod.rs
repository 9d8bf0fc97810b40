//! Credential module - provider credential checks
//!
//! Validates credentials structurally and with live probe scripts.

mod validator;
pub mod vocabulary;

pub use validator::{classify, CredentialValidator, ValidationOutcome};
