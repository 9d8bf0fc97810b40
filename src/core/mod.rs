//! Core module - shared infrastructure for the bridge
//!
//! This module contains foundational types, the provider catalog,
//! configuration, and error handling used throughout the crate.

pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::Config;
pub use error::{BridgeError, Result};
pub use provider::{ClientBinding, Model, Provider};
pub use types::*;
