//! Catalog data model

use confab_provider::ToolSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discovered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique across the catalog; the name the model sees
    pub qualified_name: String,
    /// Parsed provider prefix, empty when unresolved
    pub provider_name: String,
    pub short_name: String,
    pub enabled: bool,
    pub description: String,
    /// Registered provider that advertised the tool; invocations go here
    pub source: String,
    /// Name to hand back to `source` on invocation
    pub raw_name: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec::new(
            self.qualified_name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }
}

/// Which short tool names to enable, per provider.
///
/// Providers and each provider's list keep insertion order; duplicate
/// names are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnableSpec {
    providers: IndexMap<String, Vec<String>>,
}

impl EnableSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `names` to the enabled set of `provider`
    pub fn enable<I, S>(&mut self, provider: impl Into<String>, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.providers.entry(provider.into()).or_default();
        for name in names {
            let name = name.into();
            if !list.contains(&name) {
                list.push(name);
            }
        }
        self
    }

    pub fn with<I, S>(mut self, provider: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enable(provider, names);
        self
    }

    pub fn enabled_for(&self, provider: &str) -> Option<&[String]> {
        self.providers.get(provider).map(|v| v.as_slice())
    }

    pub fn has_provider(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    pub fn contains(&self, provider: &str, short_name: &str) -> bool {
        self.enabled_for(provider)
            .map_or(false, |names| names.iter().any(|n| n == short_name))
    }

    pub fn providers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.providers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// The tools produced by one discovery pass.
///
/// Immutable once built; filtering produces a new catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    providers: Vec<String>,
    tools: Vec<ToolDescriptor>,
    unreachable: Vec<String>,
}

impl Catalog {
    pub fn new(
        providers: Vec<String>,
        tools: Vec<ToolDescriptor>,
        unreachable: Vec<String>,
    ) -> Self {
        Self {
            providers,
            tools,
            unreachable,
        }
    }

    /// Registered provider names, in registration order
    pub fn providers(&self) -> &[String] {
        &self.providers
    }

    /// Providers whose listing failed during discovery
    pub fn unreachable(&self) -> &[String] {
        &self.unreachable
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().filter(|t| t.enabled)
    }

    pub fn get(&self, qualified_name: &str) -> Option<&ToolDescriptor> {
        self.tools
            .iter()
            .find(|t| t.qualified_name == qualified_name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    pub(crate) fn with_tools(&self, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            providers: self.providers.clone(),
            tools,
            unreachable: self.unreachable.clone(),
        }
    }
}
