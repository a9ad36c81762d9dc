//! Model capability boundary
//!
//! Defines the conversation message model shared by every confab crate and
//! the `Provider` trait through which the engine asks a model for the next
//! assistant message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use thiserror::Error;
use tracing::{debug, trace};

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

/// Model call errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model endpoint rejected the request: {0}")]
    Api(String),

    #[error("no API key configured")]
    NoApiKey,

    #[error("invalid response from model endpoint")]
    InvalidResponse,

    #[error("rate limited by model endpoint")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// A request by the model to call one tool.
///
/// `id` is unique within the assistant turn that produced it and is echoed
/// back by the matching [`Message::ToolResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

impl Invocation {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

/// One entry of a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Injected in front of the history for each model call, never persisted.
    System { text: String },
    User { text: String },
    Assistant {
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        invocations: Vec<Invocation>,
    },
    ToolResult {
        invocation_id: String,
        tool: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Message::System { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Message::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            text: text.into(),
            invocations: Vec::new(),
        }
    }

    pub fn assistant_with_invocations(
        text: impl Into<String>,
        invocations: Vec<Invocation>,
    ) -> Self {
        Message::Assistant {
            text: text.into(),
            invocations,
        }
    }

    /// Successful result for `invocation`
    pub fn tool_result(invocation: &Invocation, content: impl Into<String>) -> Self {
        Message::ToolResult {
            invocation_id: invocation.id.clone(),
            tool: invocation.tool.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error-flagged result for `invocation`
    pub fn tool_error(invocation: &Invocation, error: impl Into<String>) -> Self {
        Message::ToolResult {
            invocation_id: invocation.id.clone(),
            tool: invocation.tool.clone(),
            content: error.into(),
            is_error: true,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolResult { .. } => "tool",
        }
    }

    /// Textual payload of the message
    pub fn text(&self) -> &str {
        match self {
            Message::System { text } | Message::User { text } => text,
            Message::Assistant { text, .. } => text,
            Message::ToolResult { content, .. } => content,
        }
    }

    /// Pending invocations; empty for everything but a tool-calling assistant turn
    pub fn invocations(&self) -> &[Invocation] {
        match self {
            Message::Assistant { invocations, .. } => invocations,
            _ => &[],
        }
    }
}

/// Model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub invocations: Vec<Invocation>,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn has_invocations(&self) -> bool {
        !self.invocations.is_empty()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            invocations: Vec::new(),
            finish_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    pub fn with_invocations(invocations: Vec<Invocation>) -> Self {
        Self {
            content: None,
            invocations,
            finish_reason: "tool_calls".to_string(),
            usage: Usage::default(),
        }
    }

    /// Convert into the assistant message that gets committed to history
    pub fn into_message(self) -> Message {
        trace!(
            "model finished with {:?}, {} invocations",
            self.finish_reason,
            self.invocations.len()
        );
        Message::Assistant {
            text: self.content.unwrap_or_default(),
            invocations: self.invocations,
        }
    }
}

/// Token accounting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A tool as offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Model call parameters
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tool_choice: ToolChoice,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            tools: Vec::new(),
            max_tokens: 4096,
            temperature: 0.7,
            tool_choice: ToolChoice::Auto,
        }
    }
}

impl ChatParams {
    /// Parameters for one model call over `messages` with `tools` offered
    pub fn for_turn(model: impl Into<String>, messages: Vec<Message>, tools: Vec<ToolSpec>) -> Self {
        let tool_choice = if tools.is_empty() {
            ToolChoice::None
        } else {
            ToolChoice::Auto
        };
        debug!(
            "building model call: {} messages, {} tools",
            messages.len(),
            tools.len()
        );
        Self {
            model: model.into(),
            messages,
            tools,
            tool_choice,
            ..Default::default()
        }
    }
}

/// Tool selection mode
#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    Auto,
    Required(String),
    None,
}

/// A model that can produce the next assistant message
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
    fn default_model(&self) -> String;
    fn is_configured(&self) -> bool;
}
