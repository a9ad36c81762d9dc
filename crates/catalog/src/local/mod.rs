//! In-process tool provider

pub mod filesystem;
pub mod path_utils;

pub use filesystem::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::client::{ClientError, ProviderClient, RawTool};

pub type ToolResult = Result<String, Box<dyn std::error::Error + Send + Sync>>;

/// A tool implemented in this process
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> ToolResult;
}

/// Serves a set of [`LocalTool`]s under one provider name
pub struct LocalProvider {
    name: String,
    tools: BTreeMap<String, Box<dyn LocalTool>>,
}

impl LocalProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: BTreeMap::new(),
        }
    }

    pub fn register<T: LocalTool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn with_tool<T: LocalTool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

#[async_trait]
impl ProviderClient for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<RawTool>, ClientError> {
        Ok(self
            .tools
            .values()
            .map(|t| RawTool::new(t.name(), t.description()).with_schema(t.parameters()))
            .collect())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ClientError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ClientError::UnknownTool(name.to_string()))?;
        debug!("local provider '{}' running '{}'", self.name, name);
        tool.execute(arguments).await.map_err(|e| {
            if e.downcast_ref::<serde_json::Error>().is_some() {
                ClientError::InvalidArguments(e.to_string())
            } else {
                ClientError::Failed(e.to_string())
            }
        })
    }
}

/// File tools confined to `root`
pub fn workspace_provider(name: impl Into<String>, root: impl Into<PathBuf>) -> LocalProvider {
    let root = root.into();
    LocalProvider::new(name)
        .with_tool(ReadFileTool::new(root.clone()))
        .with_tool(WriteFileTool::new(root.clone()))
        .with_tool(EditFileTool::new(root.clone()))
        .with_tool(ListDirTool::new(root))
}
