//! Catalog status reporting

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::Catalog;

/// Snapshot of the catalog for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogStatus {
    pub initialized: bool,
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub providers: BTreeMap<String, ProviderStatus>,
    pub unreachable: Vec<String>,
    pub tools: Vec<ToolStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub enabled_tools: Vec<String>,
    pub enabled_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub short_name: String,
    pub provider: String,
    pub enabled: bool,
    pub description: String,
}

impl CatalogStatus {
    /// Report for `catalog`; zeroed when discovery has not run
    pub fn from_catalog(catalog: Option<&Catalog>) -> Self {
        let Some(catalog) = catalog else {
            return Self::default();
        };

        let mut providers: BTreeMap<String, ProviderStatus> = catalog
            .providers()
            .iter()
            .map(|p| (p.clone(), ProviderStatus::default()))
            .collect();

        for tool in catalog.enabled() {
            // unresolved tools are reported under the provider that served them
            let owner = if tool.provider_name.is_empty() {
                &tool.source
            } else {
                &tool.provider_name
            };
            let entry = providers.entry(owner.clone()).or_default();
            entry.enabled_tools.push(tool.short_name.clone());
            entry.enabled_count += 1;
        }

        let tools = catalog
            .tools()
            .iter()
            .map(|t| ToolStatus {
                name: t.qualified_name.clone(),
                short_name: t.short_name.clone(),
                provider: t.provider_name.clone(),
                enabled: t.enabled,
                description: t.description.clone(),
            })
            .collect();

        let total = catalog.len();
        let enabled = catalog.enabled_count();
        Self {
            initialized: true,
            total,
            enabled,
            disabled: total - enabled,
            providers,
            unreachable: catalog.unreachable().to_vec(),
            tools,
        }
    }

    pub fn summary(&self) -> String {
        format!("{}/{} tools enabled", self.enabled, self.total)
    }
}
