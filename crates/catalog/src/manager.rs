//! Catalog manager
//!
//! Owns the registered provider clients and the current catalog. The
//! catalog is swapped in whole after a discovery and then only read, so
//! request handlers clone the `Arc` and never hold the lock across an
//! await.

use std::sync::Arc;
use std::time::Duration;

use confab_provider::ToolSpec;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::client::ProviderClient;
use crate::descriptor::{Catalog, EnableSpec, ToolDescriptor};
use crate::discovery::discover;
use crate::filter::filter;
use crate::status::CatalogStatus;
use crate::{CatalogError, Result, ToolInvocationError};

/// Default in-flight invocations per provider
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Default per-invocation timeout
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Prefix advertised names with `<provider>_`
    pub prefix_tool_names: bool,
    pub max_concurrency: usize,
    pub tool_timeout: Duration,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            prefix_tool_names: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

struct RegisteredProvider {
    client: Arc<dyn ProviderClient>,
    permits: Arc<Semaphore>,
}

/// Aggregates tool providers into one namespaced, filtered catalog
pub struct ToolCatalogManager {
    providers: Vec<RegisteredProvider>,
    enable_spec: EnableSpec,
    options: CatalogOptions,
    catalog: RwLock<Option<Arc<Catalog>>>,
}

impl ToolCatalogManager {
    pub fn new(enable_spec: EnableSpec) -> Self {
        Self::with_options(enable_spec, CatalogOptions::default())
    }

    pub fn with_options(enable_spec: EnableSpec, options: CatalogOptions) -> Self {
        Self {
            providers: Vec::new(),
            enable_spec,
            options,
            catalog: RwLock::new(None),
        }
    }

    /// Register a provider; registration order is the fallback scan order
    pub fn register<C: ProviderClient + 'static>(&mut self, client: C) -> Result<()> {
        self.register_shared(Arc::new(client))
    }

    pub fn register_shared(&mut self, client: Arc<dyn ProviderClient>) -> Result<()> {
        let name = client.name().to_string();
        if self.providers.iter().any(|p| p.client.name() == name) {
            return Err(CatalogError::DuplicateProvider(name));
        }
        debug!(
            "registered tool provider '{}' (max {} concurrent calls)",
            name, self.options.max_concurrency
        );
        self.providers.push(RegisteredProvider {
            client,
            permits: Arc::new(Semaphore::new(self.options.max_concurrency.max(1))),
        });
        Ok(())
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.client.name().to_string())
            .collect()
    }

    pub fn enable_spec(&self) -> &EnableSpec {
        &self.enable_spec
    }

    /// Build the catalog once; later calls return the existing one
    pub async fn discover(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.catalog() {
            info!("tool catalog already built, reusing it");
            return Ok(catalog);
        }

        let clients: Vec<Arc<dyn ProviderClient>> =
            self.providers.iter().map(|p| p.client.clone()).collect();

        let discovered = match discover(&clients, self.options.prefix_tool_names).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("tool discovery failed, continuing without tools: {}", e);
                return Err(e);
            }
        };

        for spec_provider in self.enable_spec.providers().map(|(p, _)| p) {
            if !discovered.providers().iter().any(|p| p == spec_provider) {
                warn!(
                    "enable list names unregistered provider '{}'; only the fallback scan can use it",
                    spec_provider
                );
            }
        }

        let catalog = Arc::new(filter(&discovered, &self.enable_spec));
        *self.catalog.write() = Some(catalog.clone());
        Ok(catalog)
    }

    /// Drop the current catalog and discover again
    pub async fn rediscover(&self) -> Result<Arc<Catalog>> {
        self.reset();
        self.discover().await
    }

    pub fn reset(&self) {
        if self.catalog.write().take().is_some() {
            info!("tool catalog reset");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.catalog.read().is_some()
    }

    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.read().clone()
    }

    pub fn enabled_tools(&self) -> Vec<ToolDescriptor> {
        match self.catalog() {
            Some(catalog) => catalog.enabled().cloned().collect(),
            None => {
                warn!("tool catalog not built yet, no tools available");
                Vec::new()
            }
        }
    }

    /// Enabled tools in the shape the model is offered
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.catalog()
            .map(|c| c.enabled().map(ToolDescriptor::to_spec).collect())
            .unwrap_or_default()
    }

    pub fn is_tool_enabled(&self, qualified_name: &str) -> bool {
        self.catalog()
            .and_then(|c| c.get(qualified_name).map(|t| t.enabled))
            .unwrap_or(false)
    }

    pub fn status(&self) -> CatalogStatus {
        CatalogStatus::from_catalog(self.catalog().as_deref())
    }

    /// Run an enabled tool on the provider that advertised it
    pub async fn execute(
        &self,
        qualified_name: &str,
        arguments: Value,
    ) -> std::result::Result<String, ToolInvocationError> {
        let not_found = || ToolInvocationError::NotFound(qualified_name.to_string());

        let catalog = self.catalog().ok_or_else(not_found)?;
        let tool = catalog.get(qualified_name).ok_or_else(not_found)?;
        if !tool.enabled {
            return Err(ToolInvocationError::Disabled(qualified_name.to_string()));
        }
        let provider = self
            .providers
            .iter()
            .find(|p| p.client.name() == tool.source)
            .ok_or_else(not_found)?;

        let _permit = provider
            .permits
            .acquire()
            .await
            .map_err(|e| ToolInvocationError::Failed {
                tool: qualified_name.to_string(),
                message: e.to_string(),
            })?;

        debug!(
            "invoking '{}' as '{}' on provider '{}'",
            qualified_name, tool.raw_name, tool.source
        );
        let call = provider.client.invoke(&tool.raw_name, arguments);
        match tokio::time::timeout(self.options.tool_timeout, call).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ToolInvocationError::Failed {
                tool: qualified_name.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ToolInvocationError::TimedOut {
                tool: qualified_name.to_string(),
                secs: self.options.tool_timeout.as_secs(),
            }),
        }
    }
}

impl std::fmt::Debug for ToolCatalogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        write!(
            f,
            "ToolCatalogManager(initialized={}, enabled={}/{})",
            status.initialized, status.enabled, status.total
        )
    }
}
