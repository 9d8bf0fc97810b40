//! Shared types used across the bridge
//!
//! Contains conversation messages and the task value submitted for a run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::provider::Model;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A browsing task submitted for execution
///
/// Owned by the run it starts and dropped when that run terminates.
#[derive(Clone)]
pub struct Task {
    /// Natural-language description of what to do
    pub text: String,
    /// Model (and therefore provider) the script talks to
    pub model: Model,
    /// Provider credential, forwarded into the runtime for this run only
    pub credential: String,
    /// Earlier conversation, oldest first
    pub context: Vec<Message>,
}

impl Task {
    pub fn new(text: impl Into<String>, model: Model, credential: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model,
            credential: credential.into(),
            context: Vec::new(),
        }
    }

    /// Attach earlier conversation
    pub fn with_context(mut self, context: Vec<Message>) -> Self {
        self.context = context;
        self
    }

    /// Name of the environment variable carrying the credential
    pub fn credential_env_var(&self) -> &'static str {
        self.model.provider.env_var()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("text", &self.text)
            .field("model", &self.model)
            .field("credential", &"<redacted>")
            .field("context", &self.context.len())
            .finish()
    }
}
