//! Provider client seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Provider-side failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

/// A tool exactly as a provider advertises it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl RawTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_object_schema(),
        }
    }

    pub fn with_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = input_schema;
        self
    }
}

/// Connection to one named tool provider.
///
/// Clients are shared across concurrent requests, so implementations must
/// tolerate overlapping `invoke` calls.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Registered provider name
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<RawTool>, ClientError>;

    /// Run the tool the provider advertised as `name`
    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ClientError>;
}
