//! OpenAI-compatible chat-completions endpoint
//!
//! Works against LM Studio, vLLM, OpenRouter and OpenAI itself.

use crate::*;
use reqwest::{Client, StatusCode};
use serde_json::json;

pub const DEFAULT_API_BASE: &str = "http://localhost:1234/v1";
pub const DEFAULT_API_KEY: &str = "lm-studio";
pub const DEFAULT_MODEL: &str = "gpt-oss:20b";

/// Chat-completions client
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

// Response shapes; everything optional because local servers are lax.
#[derive(Deserialize)]
struct WireCompletion {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl WireToolCall {
    fn into_invocation(self) -> Invocation {
        // arguments usually arrive JSON-encoded in a string; unparseable text is kept as is
        let arguments = match self.function.arguments {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            other => other,
        };
        Invocation::new(self.id, self.function.name, arguments)
    }
}

/// Arguments as the JSON-encoded string the API expects; raw text kept from
/// an unparseable call goes back unchanged
fn wire_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn wire_message(message: &Message) -> Value {
    match message {
        Message::System { text } => json!({ "role": "system", "content": text }),
        Message::User { text } => json!({ "role": "user", "content": text }),
        Message::Assistant { text, invocations } if invocations.is_empty() => {
            json!({ "role": "assistant", "content": text })
        }
        Message::Assistant { text, invocations } => json!({
            "role": "assistant",
            "content": text,
            "tool_calls": invocations.iter().map(|inv| json!({
                "id": inv.id,
                "type": "function",
                "function": { "name": inv.tool, "arguments": wire_arguments(&inv.arguments) },
            })).collect::<Vec<_>>(),
        }),
        // error results already carry their "Error: " prefix
        Message::ToolResult {
            invocation_id,
            tool,
            content,
            ..
        } => json!({
            "role": "tool",
            "tool_call_id": invocation_id,
            "name": tool,
            "content": content,
        }),
    }
}

fn wire_tool(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        }
    })
}

fn wire_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required(name) => json!({ "type": "function", "function": { "name": name } }),
    }
}

/// Pull a readable message out of an error body, JSON or not
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                "empty response body".to_string()
            } else {
                body.chars().take(200).collect()
            }
        })
}

impl OpenAiCompatProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(&self, params: &ChatParams) -> Value {
        let model = match params.model.as_str() {
            "" => self.default_model.as_str(),
            model => model,
        };

        let mut body = json!({
            "model": model,
            "messages": params.messages.iter().map(wire_message).collect::<Vec<_>>(),
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            body["tools"] = params.tools.iter().map(wire_tool).collect();
            body["tool_choice"] = wire_tool_choice(&params.tool_choice);
        }
        body
    }

    fn parse_response(&self, body: Value) -> Result<ChatResponse> {
        let completion: WireCompletion = serde_json::from_value(body)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::InvalidResponse)?;

        Ok(ChatResponse {
            content: choice.message.content,
            invocations: choice
                .message
                .tool_calls
                .into_iter()
                .map(WireToolCall::into_invocation)
                .collect(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: completion.usage.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }
        let url = format!("{}/chat/completions", self.api_base);
        trace!("posting {} messages to {}", params.messages.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(&params))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            s if !s.is_success() => {
                return Err(ProviderError::Api(format!(
                    "{}: {}",
                    s.as_u16(),
                    error_detail(&text)
                )))
            }
            _ => {}
        }

        let response = self.parse_response(serde_json::from_str(&text)?)?;
        debug!(
            "completion finished with {:?} and {} tool calls",
            response.finish_reason,
            response.invocations.len()
        );
        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
