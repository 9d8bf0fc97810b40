//! Agent module - run lifecycle and conversation management
//!
//! The controller owns the single run slot; the conversation keeps the
//! context that follow-up tasks are submitted with.

pub mod controller;
pub mod conversation;
pub mod state;

pub use controller::AgentController;
pub use conversation::Conversation;
pub use state::{AgentState, RunReport};
