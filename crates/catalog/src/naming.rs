//! Qualified tool names
//!
//! A qualified name is `<provider>_<short>`. Provider names may themselves
//! contain the separator, so parsing picks the longest registered provider
//! that is a valid prefix.

/// Separator between provider and short tool name
pub const SEPARATOR: &str = "_";

/// Result of parsing a qualified name against the registered providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Empty when no registered provider prefix matched
    pub provider: String,
    pub short: String,
}

impl ResolvedName {
    pub fn is_resolved(&self) -> bool {
        !self.provider.is_empty()
    }
}

/// Split `qualified` into `(provider, short)`.
///
/// Deterministic: among all registered providers `p` with
/// `qualified == p + "_" + rest` and a non-empty `rest`, the longest `p`
/// wins. With no match the provider is empty and the short name is the
/// whole input.
pub fn resolve_name<I, S>(qualified: &str, providers: I) -> ResolvedName
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best: Option<&str> = None;

    for provider in providers {
        let provider = provider.as_ref();
        if provider.is_empty() {
            continue;
        }
        let Some(rest) = qualified
            .strip_prefix(provider)
            .and_then(|r| r.strip_prefix(SEPARATOR))
        else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        if best.map_or(true, |b| provider.len() > b.len()) {
            best = Some(&qualified[..provider.len()]);
        }
    }

    match best {
        Some(provider) => ResolvedName {
            provider: provider.to_string(),
            short: qualified[provider.len() + SEPARATOR.len()..].to_string(),
        },
        None => ResolvedName {
            provider: String::new(),
            short: qualified.to_string(),
        },
    }
}

/// Namespace `raw` under `provider` unless it already carries the prefix
pub fn qualify(provider: &str, raw: &str) -> String {
    let prefix = format!("{}{}", provider, SEPARATOR);
    if raw.starts_with(&prefix) && raw.len() > prefix.len() {
        raw.to_string()
    } else {
        format!("{}{}", prefix, raw)
    }
}
