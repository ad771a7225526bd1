//! Configuration management for sysaskd.
//!
//! Loads settings from /etc/sysask/config.toml or uses defaults. The
//! provider credential never lives in the file; it comes from the process
//! environment only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default config file path
pub const CONFIG_PATH: &str = "/etc/sysask/config.toml";

/// Environment variable holding the completion-provider API key
pub const API_KEY_ENV: &str = "SYSASK_API_KEY";

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for both command generation and interpretation
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for a single completion call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    20
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Retries after the first failed generation attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Optional plain-text file prepended to every generation prompt
    #[serde(default)]
    pub context_file: Option<PathBuf>,
}

fn default_max_retries() -> u32 {
    2
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            context_file: None,
        }
    }
}

/// Shell executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Per-command timeout
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,

    /// Captured-output cap in bytes
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
}

fn default_exec_timeout() -> u64 {
    30
}

fn default_max_output() -> usize {
    10 * 1024 * 1024
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_exec_timeout(),
            max_output_bytes: default_max_output(),
        }
    }
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub resolver: ResolverConfig,
    pub executor: ExecutorConfig,
}

impl Config {
    /// Load config from `path`, falling back to defaults when the file is
    /// absent. A present-but-invalid file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Read the provider credential from the environment. Empty values count
    /// as absent.
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
