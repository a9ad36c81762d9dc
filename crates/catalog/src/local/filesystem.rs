//! Workspace file tools

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::path_utils::resolve_in_root;
use super::{LocalTool, ToolResult};

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[async_trait]
impl LocalTool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the workspace."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "File path, relative to the workspace" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: PathArgs = serde_json::from_value(args)?;
        let path = resolve_in_root(&args.path, &self.root).await?;
        debug!("reading {:?}", path);

        if !path.is_file() {
            return Err(format!("no such file: {}", args.path).into());
        }
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait]
impl LocalTool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write a file in the workspace, creating parent directories as needed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path, relative to the workspace" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: WriteFileArgs = serde_json::from_value(args)?;
        let path = resolve_in_root(&args.path, &self.root).await?;
        debug!("writing {} bytes to {:?}", args.content.len(), path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &args.content).await?;
        Ok(format!("wrote {} bytes to {}", args.content.len(), args.path))
    }
}

pub struct EditFileTool {
    root: PathBuf,
}

impl EditFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct EditFileArgs {
    path: String,
    old_text: String,
    new_text: String,
}

#[async_trait]
impl LocalTool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace one exact occurrence of old_text with new_text in a workspace file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path, relative to the workspace" },
                "old_text": { "type": "string", "description": "Text to replace; must occur exactly once" },
                "new_text": { "type": "string", "description": "Replacement text" }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: EditFileArgs = serde_json::from_value(args)?;
        let path = resolve_in_root(&args.path, &self.root).await?;
        debug!("editing {:?}", path);

        if !path.is_file() {
            return Err(format!("no such file: {}", args.path).into());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        match content.matches(&args.old_text).count() {
            0 => Err(format!("old_text not found in {}", args.path).into()),
            1 => {
                let updated = content.replacen(&args.old_text, &args.new_text, 1);
                tokio::fs::write(&path, updated).await?;
                Ok(format!("edited {}", args.path))
            }
            n => Err(format!("old_text matches {} times in {}; make it unique", n, args.path).into()),
        }
    }
}

pub struct ListDirTool {
    root: PathBuf,
}

impl ListDirTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl LocalTool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string", "description": "Directory path, relative to the workspace" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let args: PathArgs = serde_json::from_value(args)?;
        let path = resolve_in_root(&args.path, &self.root).await?;
        debug!("listing {:?}", path);

        if !path.is_dir() {
            return Err(format!("no such directory: {}", args.path).into());
        }
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                items.push(format!("{}/", name));
            } else {
                items.push(name);
            }
        }
        items.sort();
        if items.is_empty() {
            Ok("(empty)".to_string())
        } else {
            Ok(items.join("\n"))
        }
    }
}
