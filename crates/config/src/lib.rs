//! Configuration management for confab
//!
//! One JSON file holds the model endpoint, engine limits, tool providers
//! with their enable lists, and the checkpoint backend. A missing file means
//! defaults; a handful of `CONFAB_*` environment variables override the
//! file after loading.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, expand_tilde, threads_dir, workspace_path};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// OpenAI-compatible model endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: default_api_key(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_api_key() -> String {
    "lm-studio".to_string()
}

fn default_model() -> String {
    "gpt-oss:20b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

/// Turn loop limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_max_round_trips")]
    pub max_round_trips: usize,
    #[serde(default = "default_true")]
    pub parallel_tool_calls: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_round_trips: default_max_round_trips(),
            parallel_tool_calls: true,
        }
    }
}

fn default_max_round_trips() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// How to reach one tool provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEntry {
    /// File tools confined to `root`
    Workspace {
        #[serde(default = "default_workspace_root")]
        root: String,
    },
}

fn default_workspace_root() -> String {
    "~/.confab/workspace".to_string()
}

/// Short tool names enabled for one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolEnableList {
    #[serde(default)]
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Off means chat-only: no provider is contacted
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub prefix_tool_names: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_providers")]
    pub providers: IndexMap<String, ProviderEntry>,
    #[serde(default = "default_tools_config")]
    pub tools_config: IndexMap<String, ToolEnableList>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix_tool_names: true,
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout_secs(),
            providers: default_providers(),
            tools_config: default_tools_config(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_providers() -> IndexMap<String, ProviderEntry> {
    IndexMap::from([(
        "workspace".to_string(),
        ProviderEntry::Workspace {
            root: default_workspace_root(),
        },
    )])
}

fn default_tools_config() -> IndexMap<String, ToolEnableList> {
    IndexMap::from([(
        "workspace".to_string(),
        ToolEnableList {
            enabled: vec!["read_file".to_string(), "list_dir".to_string()],
        },
    )])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: CheckpointBackend,
    #[serde(default = "default_threads_dir")]
    pub dir: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            dir: default_threads_dir(),
        }
    }
}

fn default_threads_dir() -> String {
    "~/.confab/threads".to_string()
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl Config {
    /// Load from the default location, apply env overrides and validate
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path()).await?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; defaults when it does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Like [`load_from`](Self::load_from) but a missing file is an error
    pub async fn load_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::load_from(path).await
    }

    pub async fn save(&self) -> Result<()> {
        self.save_to(&config_path()).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("saving config to {:?}", path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Apply `CONFAB_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CONFAB_API_BASE") {
            self.model.api_base = v;
        }
        if let Some(v) = lookup("CONFAB_API_KEY") {
            self.model.api_key = v;
        }
        if let Some(v) = lookup("CONFAB_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = lookup("CONFAB_TEMPERATURE") {
            self.model.temperature = v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("CONFAB_TEMPERATURE is not a number: {:?}", v))
            })?;
        }
        if let Some(v) = lookup("CONFAB_TOOLS_ENABLED") {
            self.tools.enabled = parse_flag(&v).ok_or_else(|| {
                ConfigError::Invalid(format!("CONFAB_TOOLS_ENABLED is not a boolean: {:?}", v))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.max_round_trips == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_round_trips must be at least 1".into(),
            ));
        }
        if self.tools.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "tools.max_concurrency must be at least 1".into(),
            ));
        }
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tools.timeout_secs must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be within 0.0..=2.0, got {}",
                self.model.temperature
            )));
        }
        for name in self.tools.providers.keys() {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "tool provider name {:?} must be non-empty without whitespace",
                    name
                )));
            }
        }
        for name in self.tools.tools_config.keys() {
            if !self.tools.providers.contains_key(name) {
                warn!("tools_config names unknown provider '{}'", name);
            }
        }
        Ok(())
    }

    /// Enabled short names per provider, in file order
    pub fn enabled_tools(&self) -> IndexMap<String, Vec<String>> {
        self.tools
            .tools_config
            .iter()
            .map(|(provider, list)| (provider.clone(), list.enabled.clone()))
            .collect()
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        expand_tilde(&self.checkpoint.dir)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Write a default config if none exists, create the workspace, and load
pub async fn init() -> Result<Config> {
    let path = config_path();

    if path.exists() {
        warn!("config already exists at {:?}", path);
    } else {
        Config::default().save_to(&path).await?;
        info!("wrote default config to {:?}", path);
    }

    let config = Config::load_from(&path).await?;
    for (name, entry) in &config.tools.providers {
        let ProviderEntry::Workspace { root } = entry;
        let root = expand_tilde(root);
        tokio::fs::create_dir_all(&root).await?;
        info!("workspace for '{}' ready at {:?}", name, root);
    }
    Ok(config)
}
