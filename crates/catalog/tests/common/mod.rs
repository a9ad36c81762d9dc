//! Shared provider doubles for catalog tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use confab_catalog::{ClientError, ProviderClient, RawTool};
use parking_lot::Mutex;
use serde_json::Value;

/// Provider with a fixed tool list that echoes its invocations
pub struct StaticProvider {
    name: String,
    tools: Vec<RawTool>,
    unreachable: bool,
    failing: Vec<String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<(String, Value)>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl StaticProvider {
    pub fn new(name: &str, tools: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|t| RawTool::new(*t, format!("{} tool", t)))
                .collect(),
            unreachable: false,
            failing: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Tools `t0..tN`
    pub fn numbered(name: &str, count: usize, extra: &[&str]) -> Self {
        let mut names: Vec<String> = (0..count).map(|i| format!("t{}", i)).collect();
        names.extend(extra.iter().map(|s| s.to_string()));
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        Self::new(name, &refs)
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn failing(mut self, tool: &str) -> Self {
        self.failing.push(tool.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProviderClient for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<RawTool>, ClientError> {
        if self.unreachable {
            return Err(ClientError::Unreachable("connection refused".into()));
        }
        Ok(self.tools.clone())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ClientError> {
        self.calls.lock().push((name.to_string(), arguments.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|t| t == name) {
            return Err(ClientError::Failed(format!("{} exploded", name)));
        }
        Ok(format!("{}:{}({})", self.name, name, arguments))
    }
}
