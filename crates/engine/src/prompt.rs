//! System prompts

const TOOL_MODE: &str = "You are a helpful assistant with access to tools. \
Call a tool when it helps answer the user's request, read its result, and then reply. \
If a tool reports an error, explain what went wrong or try a different approach. \
Answer directly when no tool is needed.";

const CHAT_ONLY: &str = "You are a helpful assistant. \
No tools are available in this conversation, so answer from your own knowledge \
and say so when you cannot be sure.";

/// Prompt injected in front of every model call, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SystemPrompt {
    pub with_tools: String,
    pub chat_only: String,
}

impl SystemPrompt {
    pub fn new(with_tools: impl Into<String>, chat_only: impl Into<String>) -> Self {
        Self {
            with_tools: with_tools.into(),
            chat_only: chat_only.into(),
        }
    }

    /// Same text whether or not tools are offered
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(text.clone(), text)
    }

    pub fn select(&self, tools_available: bool) -> &str {
        if tools_available {
            &self.with_tools
        } else {
            &self.chat_only
        }
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(TOOL_MODE, CHAT_ONLY)
    }
}
