//! Common test utilities for confab integration tests
#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

/// Isolated home, config, workspace and thread directory
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
    pub workspace_dir: PathBuf,
    pub threads_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join(".confab").join("config.json");
        let workspace_dir = temp_dir.path().join("workspace");
        let threads_dir = temp_dir.path().join("threads");
        std::fs::create_dir_all(&workspace_dir)?;

        Ok(Self {
            temp_dir,
            config_path,
            workspace_dir,
            threads_dir,
        })
    }

    /// Config pointing at `api_base` with one workspace provider `ws`
    pub fn config(&self, api_base: &str) -> Value {
        json!({
            "model": { "api_base": api_base, "api_key": "test-key", "model": "test-model" },
            "engine": { "max_round_trips": 3 },
            "tools": {
                "providers": {
                    "ws": { "type": "workspace", "root": self.workspace_dir }
                },
                "tools_config": { "ws": { "enabled": ["read_file", "list_dir"] } }
            },
            "checkpoint": { "backend": "file", "dir": self.threads_dir }
        })
    }

    pub fn write_config(&self, config: &Value) -> anyhow::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }

    /// Command with HOME and config location pinned to this environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_confab"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("CONFAB_CONFIG", &self.config_path);
        for var in [
            "CONFAB_API_BASE",
            "CONFAB_API_KEY",
            "CONFAB_MODEL",
            "CONFAB_TEMPERATURE",
            "CONFAB_TOOLS_ENABLED",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
