//! Tool discovery across providers

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::client::ProviderClient;
use crate::descriptor::{Catalog, ToolDescriptor};
use crate::naming::{qualify, resolve_name};
use crate::{CatalogError, Result};

/// Query every provider and concatenate their tools in registration order.
///
/// Unreachable providers are logged and contribute nothing; discovery only
/// fails when no provider is registered or every listing failed. All
/// descriptors come back disabled; see [`crate::filter`].
pub async fn discover(
    providers: &[Arc<dyn ProviderClient>],
    prefix_tool_names: bool,
) -> Result<Catalog> {
    if providers.is_empty() {
        return Err(CatalogError::NoProviders);
    }

    let names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();
    info!("discovering tools from providers: {:?}", names);

    let listings = join_all(providers.iter().map(|p| p.list_tools())).await;

    let mut tools = Vec::new();
    let mut seen = HashSet::new();
    let mut unreachable = Vec::new();
    let mut failures = Vec::new();

    for (provider, listing) in providers.iter().zip(listings) {
        let source = provider.name();
        let raw_tools = match listing {
            Ok(raw_tools) => raw_tools,
            Err(e) => {
                warn!("tool provider '{}' unreachable, skipping: {}", source, e);
                unreachable.push(source.to_string());
                failures.push(format!("{}: {}", source, e));
                continue;
            }
        };
        debug!("provider '{}' advertised {} tools", source, raw_tools.len());

        for raw in raw_tools {
            let qualified_name = if prefix_tool_names {
                qualify(source, &raw.name)
            } else {
                raw.name.clone()
            };
            if !seen.insert(qualified_name.clone()) {
                warn!(
                    "duplicate tool name '{}' from provider '{}', keeping the first",
                    qualified_name, source
                );
                continue;
            }

            let resolved = resolve_name(&qualified_name, &names);
            tools.push(ToolDescriptor {
                qualified_name,
                provider_name: resolved.provider,
                short_name: resolved.short,
                enabled: false,
                description: raw.description,
                source: source.to_string(),
                raw_name: raw.name,
                input_schema: raw.input_schema,
            });
        }
    }

    if unreachable.len() == providers.len() {
        return Err(CatalogError::AllProvidersFailed(failures));
    }

    info!(
        "discovered {} tools ({} providers unreachable)",
        tools.len(),
        unreachable.len()
    );
    Ok(Catalog::new(names, tools, unreachable))
}
