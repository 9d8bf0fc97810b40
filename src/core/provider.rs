//! Provider catalog and credential bindings
//!
//! Maps every supported model provider to the environment variable the
//! generated script expects its credential under, the literal prefix its
//! keys carry, and the LangChain client used to talk to it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::BridgeError;

/// Model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    DeepSeek,
    Gemini,
    Grok,
    Novita,
}

/// How a generated script constructs the chat client for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientBinding {
    /// Python module exporting the client class
    pub module: &'static str,
    /// Client class name
    pub class: &'static str,
    /// Keyword argument the class takes the credential under
    pub key_kwarg: &'static str,
    /// OpenAI-compatible endpoint, when the provider is reached through one
    pub base_url: Option<&'static str>,
}

const OPENAI_CLIENT: ClientBinding = ClientBinding {
    module: "langchain_openai",
    class: "ChatOpenAI",
    key_kwarg: "api_key",
    base_url: None,
};

impl Provider {
    /// All providers, in catalog order
    pub const ALL: [Provider; 6] = [
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::DeepSeek,
        Provider::Gemini,
        Provider::Grok,
        Provider::Novita,
    ];

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::DeepSeek => "DeepSeek",
            Provider::Gemini => "Google Gemini",
            Provider::Grok => "Grok",
            Provider::Novita => "Novita",
        }
    }

    /// Environment variable the runtime reads the credential from
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Grok => "GROK_API_KEY",
            Provider::Novita => "NOVITA_API_KEY",
        }
    }

    /// Literal prefix every key issued by this provider starts with
    pub fn key_prefix(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAI | Provider::DeepSeek => Some("sk-"),
            Provider::Anthropic => Some("sk-ant-"),
            Provider::Gemini => Some("AIza"),
            Provider::Grok => Some("xai-"),
            Provider::Novita => None,
        }
    }

    /// Client used by generated scripts
    pub fn client(&self) -> ClientBinding {
        match self {
            Provider::OpenAI => OPENAI_CLIENT,
            Provider::Anthropic => ClientBinding {
                module: "langchain_anthropic",
                class: "ChatAnthropic",
                key_kwarg: "api_key",
                base_url: None,
            },
            Provider::Gemini => ClientBinding {
                module: "langchain_google_genai",
                class: "ChatGoogleGenerativeAI",
                key_kwarg: "google_api_key",
                base_url: None,
            },
            Provider::DeepSeek => ClientBinding {
                base_url: Some("https://api.deepseek.com/v1"),
                ..OPENAI_CLIENT
            },
            Provider::Grok => ClientBinding {
                base_url: Some("https://api.x.ai/v1"),
                ..OPENAI_CLIENT
            },
            Provider::Novita => ClientBinding {
                base_url: Some("https://api.novita.ai/v3/openai"),
                ..OPENAI_CLIENT
            },
        }
    }

    /// Default models offered for this provider
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAI => &["gpt-4o", "gpt-4", "gpt-3.5-turbo"],
            Provider::Anthropic => &["claude-3-opus", "claude-3-sonnet", "claude-3-haiku"],
            Provider::DeepSeek => &["deepseek-v3"],
            Provider::Gemini => &["gemini-pro", "gemini-ultra"],
            Provider::Grok => &["grok-1"],
            Provider::Novita => &["novita-v1"],
        }
    }

    /// Guess the provider serving a model id
    pub fn for_model(model_id: &str) -> Option<Provider> {
        let id = model_id.trim().to_lowercase();
        if let Some(provider) = Provider::ALL
            .into_iter()
            .find(|p| p.models().iter().any(|m| *m == id))
        {
            return Some(provider);
        }

        if id.starts_with("gpt-") || id.starts_with("o1") || id.starts_with("o3") {
            Some(Provider::OpenAI)
        } else if id.starts_with("claude") {
            Some(Provider::Anthropic)
        } else if id.starts_with("deepseek") {
            Some(Provider::DeepSeek)
        } else if id.starts_with("gemini") {
            Some(Provider::Gemini)
        } else if id.starts_with("grok") {
            Some(Provider::Grok)
        } else if id.starts_with("novita") {
            Some(Provider::Novita)
        } else {
            None
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            "deepseek" => Ok(Provider::DeepSeek),
            "gemini" | "google" | "google gemini" => Ok(Provider::Gemini),
            "grok" | "xai" => Ok(Provider::Grok),
            "novita" => Ok(Provider::Novita),
            other => Err(BridgeError::invalid_input(format!(
                "unknown provider '{}'",
                other
            ))),
        }
    }
}

/// A model id bound to the provider serving it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub provider: Provider,
}

impl Model {
    pub fn new(id: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }

    /// Bind a model id to its provider, assuming OpenAI when unknown
    pub fn resolve(id: impl Into<String>) -> Self {
        let id = id.into();
        let provider = Provider::for_model(&id).unwrap_or(Provider::OpenAI);
        Self { id, provider }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new("gpt-4o", Provider::OpenAI)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.provider)
    }
}
