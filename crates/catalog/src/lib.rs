//! Tool catalog
//!
//! Discovers tools from any number of named providers, namespaces them as
//! `<provider>_<tool>`, decides which ones are enabled and routes
//! invocations back to the provider that advertised them.

use thiserror::Error;

pub mod client;
pub mod descriptor;
pub mod discovery;
pub mod filter;
pub mod local;
pub mod manager;
pub mod naming;
pub mod status;

pub use client::{ClientError, ProviderClient, RawTool};
pub use descriptor::{Catalog, EnableSpec, ToolDescriptor};
pub use discovery::discover;
pub use filter::filter;
pub use local::{workspace_provider, LocalProvider, LocalTool};
pub use manager::{CatalogOptions, ToolCatalogManager};
pub use naming::{qualify, resolve_name, ResolvedName, SEPARATOR};
pub use status::{CatalogStatus, ProviderStatus, ToolStatus};

/// Catalog build errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("no tool providers registered")]
    NoProviders,

    #[error("no tool provider reachable: {}", .0.join("; "))]
    AllProvidersFailed(Vec<String>),

    #[error("tool provider '{0}' is registered twice")]
    DuplicateProvider(String),
}

/// A single tool call that did not produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolInvocationError {
    #[error("tool '{0}' does not exist")]
    NotFound(String),

    #[error("tool '{0}' is not enabled")]
    Disabled(String),

    #[error("tool '{tool}' failed: {message}")]
    Failed { tool: String, message: String },

    #[error("tool '{tool}' timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
