//! Conversation engine - turn loop

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use confab_catalog::{CatalogStatus, ToolCatalogManager};
use confab_checkpoint::{CheckpointStore, ThreadLocks};
use confab_provider::{ChatParams, ChatResponse, Invocation, Message, Provider, ToolSpec};

use crate::prompt::SystemPrompt;
use crate::state::{next_state, TurnState};
use crate::{EngineError, Result};

/// Default cap on model calls per `submit`
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 10;

/// Result recorded for invocations whose turn was cut short
pub const INTERRUPTED_RESULT: &str = "Error: tool call interrupted before completion";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model name; the provider default when unset
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Model calls allowed per `submit`
    pub max_round_trips: usize,
    /// Run the invocations of one assistant message concurrently
    pub parallel_tool_calls: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: 4096,
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            parallel_tool_calls: true,
        }
    }
}

/// Runs turns for any number of threads
///
/// Turns on the same thread are serialized; turns on different threads
/// run independently.
pub struct ConversationEngine<P: Provider> {
    provider: Arc<P>,
    catalog: Arc<ToolCatalogManager>,
    store: Arc<dyn CheckpointStore>,
    prompt: SystemPrompt,
    config: EngineConfig,
    thread_locks: ThreadLocks,
}

impl<P: Provider> ConversationEngine<P> {
    pub fn new(
        provider: P,
        catalog: Arc<ToolCatalogManager>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self::with_config(
            provider,
            catalog,
            store,
            SystemPrompt::default(),
            EngineConfig::default(),
        )
    }

    pub fn with_config(
        provider: P,
        catalog: Arc<ToolCatalogManager>,
        store: Arc<dyn CheckpointStore>,
        prompt: SystemPrompt,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            catalog,
            store,
            prompt,
            config,
            thread_locks: ThreadLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> String {
        self.config
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub async fn new_thread(&self) -> Result<String> {
        Ok(self.store.new_thread_id().await?)
    }

    pub async fn get_history(&self, thread_id: &str) -> Result<Vec<Message>> {
        Ok(self.store.load(thread_id).await?)
    }

    pub async fn list_threads(&self) -> Result<Vec<String>> {
        Ok(self.store.list_threads().await?)
    }

    pub fn status(&self) -> CatalogStatus {
        self.catalog.status()
    }

    pub fn enabled_tools(&self) -> Vec<ToolSpec> {
        self.catalog.tool_specs()
    }

    /// Run one turn and return the final assistant text
    pub async fn submit(&self, thread_id: &str, text: &str) -> Result<String> {
        self.submit_with_cancel(thread_id, text, &CancellationToken::new())
            .await
    }

    /// Like [`submit`](Self::submit), aborting the current step once
    /// `cancel` fires. Steps already committed stay in the thread.
    pub async fn submit_with_cancel(
        &self,
        thread_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let span = info_span!("submit", thread_id = %thread_id);
        self.run_turn(thread_id, text, cancel).instrument(span).await
    }

    /// Threads with a turn running or queued
    pub fn busy_threads(&self) -> usize {
        self.thread_locks.len()
    }

    async fn run_turn(
        &self,
        thread_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let _lease = self.thread_locks.acquire(thread_id).await;

        let mut history = self.store.load(thread_id).await?;
        info!(
            "processing message ({} prior messages in thread)",
            history.len()
        );
        debug!("content: {}", truncate(text, 100));

        let unanswered = unanswered_invocations(&history);
        if !unanswered.is_empty() {
            warn!(
                "closing {} tool calls left open by an interrupted turn",
                unanswered.len()
            );
            let results = unanswered
                .iter()
                .map(|inv| Message::tool_error(inv, INTERRUPTED_RESULT))
                .collect();
            self.commit(thread_id, &mut history, results).await?;
        }

        let user = Message::user(text);
        self.commit(thread_id, &mut history, vec![user]).await?;

        let mut round_trips = 0;
        loop {
            let state = history
                .last()
                .map(next_state)
                .unwrap_or(TurnState::ModelTurn);

            match state {
                TurnState::Idle => {
                    let reply = history.last().map(|m| m.text().to_string());
                    info!("turn finished after {} model calls", round_trips);
                    return Ok(reply.unwrap_or_default());
                }
                TurnState::ModelTurn => {
                    if round_trips >= self.config.max_round_trips {
                        warn!(
                            "model still requesting tools after {} round trips, stopping",
                            round_trips
                        );
                        return Err(EngineError::TurnLimitExceeded {
                            limit: self.config.max_round_trips,
                        });
                    }
                    round_trips += 1;
                    debug!("model call {}", round_trips);

                    let reply = self.call_model(&history, cancel).await?;
                    self.commit(thread_id, &mut history, vec![reply]).await?;
                }
                TurnState::ToolTurn => {
                    let invocations = history
                        .last()
                        .map(|m| m.invocations().to_vec())
                        .unwrap_or_default();
                    let results = self.run_tools(&invocations, cancel).await?;
                    self.commit(thread_id, &mut history, results).await?;
                }
            }
        }
    }

    /// Persist, then extend the in-memory view
    async fn commit(
        &self,
        thread_id: &str,
        history: &mut Vec<Message>,
        messages: Vec<Message>,
    ) -> Result<()> {
        self.store.append(thread_id, &messages).await?;
        history.extend(messages);
        Ok(())
    }

    async fn call_model(&self, history: &[Message], cancel: &CancellationToken) -> Result<Message> {
        let tools = self.catalog.tool_specs();
        let prompt = self.prompt.select(!tools.is_empty());

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(prompt));
        messages.extend_from_slice(history);

        let params = ChatParams {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            ..ChatParams::for_turn(self.model(), messages, tools)
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled during model call");
                return Err(EngineError::Cancelled);
            }
            response = self.provider.chat(params) => response?,
        };
        Ok(normalize_invocations(response))
    }

    async fn run_tools(
        &self,
        invocations: &[Invocation],
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        debug!(
            "running {} tool calls ({})",
            invocations.len(),
            if self.config.parallel_tool_calls {
                "parallel"
            } else {
                "sequential"
            }
        );

        if self.config.parallel_tool_calls {
            // join_all yields in input order regardless of completion order
            let calls = join_all(invocations.iter().map(|inv| self.run_tool(inv)));
            return tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancelled during tool calls");
                    Err(EngineError::Cancelled)
                }
                results = calls => Ok(results),
            };
        }

        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancelled during tool '{}'", invocation.tool);
                    return Err(EngineError::Cancelled);
                }
                result = self.run_tool(invocation) => results.push(result),
            }
        }
        Ok(results)
    }

    /// Tool failures become error-flagged results for the model to read
    async fn run_tool(&self, invocation: &Invocation) -> Message {
        debug!("executing tool: {}", invocation.tool);
        match self
            .catalog
            .execute(&invocation.tool, invocation.arguments.clone())
            .await
        {
            Ok(output) => Message::tool_result(invocation, output),
            Err(e) => {
                warn!("tool call {} failed: {}", invocation.id, e);
                Message::tool_error(invocation, format!("Error: {}", e))
            }
        }
    }
}

/// Invocations of the trailing assistant message that have no result yet.
///
/// Only the tail of the thread counts: the last assistant message with
/// invocations followed by nothing but tool results.
fn unanswered_invocations(history: &[Message]) -> Vec<Invocation> {
    let Some(pos) = history
        .iter()
        .rposition(|m| !matches!(m, Message::ToolResult { .. }))
    else {
        return Vec::new();
    };
    let answered: HashSet<&str> = history[pos + 1..]
        .iter()
        .filter_map(|m| match m {
            Message::ToolResult { invocation_id, .. } => Some(invocation_id.as_str()),
            _ => None,
        })
        .collect();
    history[pos]
        .invocations()
        .iter()
        .filter(|inv| !answered.contains(inv.id.as_str()))
        .cloned()
        .collect()
}

/// Give every invocation of the reply a non-empty id unique within it
fn normalize_invocations(response: ChatResponse) -> Message {
    let mut message = response.into_message();
    if let Message::Assistant { invocations, .. } = &mut message {
        let mut seen = HashSet::new();
        for invocation in invocations.iter_mut() {
            if invocation.id.is_empty() || !seen.insert(invocation.id.clone()) {
                let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
                debug!(
                    "replacing invocation id {:?} with {} for {}",
                    invocation.id, fresh, invocation.tool
                );
                invocation.id = fresh.clone();
                seen.insert(fresh);
            }
        }
    }
    message
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
