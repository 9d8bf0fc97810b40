//! Configuration management for the bridge
//!
//! Supports environment variables, config files, and runtime overrides.
//! Credentials are never part of the configuration.
//!
//! Config file location: ~/.config/browsebridge/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{BridgeError, Result};

/// Environment variable carrying the runtime's package path into the child
pub const LIBRARY_PATH_VAR: &str = "PYTHONPATH";
/// Environment variable carrying the runtime's virtual-env root into the child
pub const VIRTUAL_ENV_VAR: &str = "VIRTUAL_ENV";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External runtime configuration
    pub runtime: RuntimeConfig,
    /// Agent run configuration
    pub agent: AgentConfig,
    /// Credential validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// External runtime (Python interpreter) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interpreter binary, resolved through PATH when not absolute
    pub binary: PathBuf,
    /// Extra package directory exported as PYTHONPATH
    pub library_path: Option<String>,
    /// Virtual environment exported as VIRTUAL_ENV
    pub virtual_env: Option<String>,
    /// Directory for temporary scripts (system temp dir when unset)
    pub script_dir: Option<PathBuf>,
    /// Maximum bytes kept per output stream
    pub output_limit_bytes: usize,
}

/// Agent run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model used when none is selected
    /// Default: gpt-4o
    pub default_model: String,
    /// Wall-clock limit for a single task run
    /// Default: 600
    pub run_timeout_secs: u64,
    /// Maximum browser-use agent steps
    /// Default: 25
    pub max_steps: u32,
    /// Number of recent messages forwarded as context
    /// Default: 20
    pub context_window: usize,
    /// Whether to show debug output
    pub debug: bool,
}

/// Credential validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Wall-clock limit for a probe script
    /// Default: 30
    pub timeout_secs: u64,
    /// Credentials shorter than this are rejected without a probe
    /// Default: 20
    pub min_credential_len: usize,
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| v == "true" || v == "1")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: env::var("BROWSEBRIDGE_PYTHON")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("python3")),
            library_path: env::var("BROWSEBRIDGE_PYTHONPATH").ok(),
            virtual_env: env::var("BROWSEBRIDGE_VENV").ok(),
            script_dir: None,
            output_limit_bytes: 1024 * 1024,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_model: env::var("BROWSEBRIDGE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            run_timeout_secs: env::var("BROWSEBRIDGE_RUN_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            max_steps: 25,
            context_window: 20,
            debug: env_flag("BROWSEBRIDGE_DEBUG").unwrap_or(false),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            min_credential_len: 20,
        }
    }
}

impl RuntimeConfig {
    /// Fixed runtime-location variables exported to every child
    pub fn location_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(ref path) = self.library_path {
            vars.push((LIBRARY_PATH_VAR, path.clone()));
        }
        if let Some(ref venv) = self.virtual_env {
            vars.push((VIRTUAL_ENV_VAR, venv.clone()));
        }
        vars
    }
}

impl AgentConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("browsebridge")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load configuration from the default file only
    pub fn load_from_file() -> Result<Self> {
        Self::load_from(&Self::config_file())
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BridgeError::config("Config file not found"));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| BridgeError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    BridgeError::config(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| BridgeError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
