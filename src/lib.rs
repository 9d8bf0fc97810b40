//! Browsebridge - supervised browser-automation runs
//!
//! Turns a natural-language browsing task into a browser-use script, runs it
//! in an external Python runtime and publishes the run's lifecycle.
//!
//! # Architecture
//!
//! - **Core**: Shared types, provider catalog, configuration, and error handling
//! - **Script**: Script generation and safe literal embedding
//! - **Runtime**: Subprocess supervision and dependency probing
//! - **Agent**: Single-slot run lifecycle and conversation context
//! - **Credential**: Structural and live credential checks
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use browsebridge::{AgentController, Config, Model, ProcessRunner, Task};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load();
//!     let runner = Arc::new(ProcessRunner::new(config.runtime.clone()));
//!     let controller = AgentController::from_config(&config, runner);
//!
//!     let task = Task::new("Find the top story on news.ycombinator.com", Model::default(), "sk-...");
//!     controller.submit(task);
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod credential;
pub mod logging;
pub mod runtime;
pub mod script;

// Re-export commonly used items
pub use agent::{AgentController, AgentState, RunReport};
pub use cli::Repl;
pub use core::{BridgeError, Config, Model, Provider, Result, Task};
pub use credential::{CredentialValidator, ValidationOutcome};
pub use runtime::{EnvironmentProbe, ProcessRunner, RunResult, ScriptRunner};
pub use script::ScriptGenerator;
