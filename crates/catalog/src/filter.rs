//! Enable filtering

use tracing::{debug, info};

use crate::descriptor::{Catalog, EnableSpec, ToolDescriptor};

/// Mark which tools of `catalog` are enabled under `spec`.
///
/// Every flag is recomputed from scratch, so filtering twice with the same
/// enable lists is a no-op. A tool whose provider prefix was recovered is enabled
/// iff its short name is in that provider's list. A tool with no recovered
/// prefix is matched best-effort against every provider's list, by short or
/// full name, in provider registration order; when two providers enable
/// the same short name the first one claims it.
pub fn filter(catalog: &Catalog, spec: &EnableSpec) -> Catalog {
    for (provider, names) in spec.providers() {
        debug!("enable list for '{}': {:?}", provider, names);
    }

    let scan_order = fallback_order(catalog, spec);
    let tools: Vec<ToolDescriptor> = catalog
        .tools()
        .iter()
        .map(|tool| {
            let mut tool = tool.clone();
            tool.enabled = is_enabled(&tool, spec, &scan_order);
            debug!(
                "tool '{}' (provider '{}', short '{}') enabled={}",
                tool.qualified_name, tool.provider_name, tool.short_name, tool.enabled
            );
            tool
        })
        .collect();

    let filtered = catalog.with_tools(tools);
    info!(
        "enabled {}/{} tools",
        filtered.enabled_count(),
        filtered.len()
    );
    filtered
}

fn is_enabled(tool: &ToolDescriptor, spec: &EnableSpec, scan_order: &[&str]) -> bool {
    if !tool.provider_name.is_empty() {
        return spec.contains(&tool.provider_name, &tool.short_name);
    }

    for provider in scan_order {
        let Some(names) = spec.enabled_for(provider) else {
            continue;
        };
        if names
            .iter()
            .any(|n| *n == tool.short_name || *n == tool.qualified_name)
        {
            debug!(
                "tool '{}' enabled through '{}' list by fallback scan",
                tool.qualified_name, provider
            );
            return true;
        }
    }
    false
}

/// Registered providers first, then providers only named in the enable lists
fn fallback_order<'a>(catalog: &'a Catalog, spec: &'a EnableSpec) -> Vec<&'a str> {
    let mut order: Vec<&str> = catalog
        .providers()
        .iter()
        .map(|p| p.as_str())
        .filter(|p| spec.has_provider(p))
        .collect();
    for (provider, _) in spec.providers() {
        if !order.contains(&provider) {
            order.push(provider);
        }
    }
    order
}
