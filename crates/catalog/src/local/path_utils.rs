//! Root-confined path resolution for workspace tools

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("path '{path}' is outside the workspace {root}")]
pub struct PathEscapeError {
    pub path: String,
    pub root: String,
}

/// Resolve `requested` against `root`, refusing anything that lands outside.
///
/// Relative paths are joined to the root; absolute paths must already point
/// inside it. `..` is folded lexically first, then the deepest existing
/// ancestor is canonicalized so a symlink cannot lead out of the root.
pub async fn resolve_in_root(requested: &str, root: &Path) -> Result<PathBuf, PathEscapeError> {
    let escape = || PathEscapeError {
        path: requested.to_string(),
        root: root.display().to_string(),
    };

    let root = tokio::fs::canonicalize(root)
        .await
        .unwrap_or_else(|_| normalize(root));

    let joined = {
        let p = Path::new(requested);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            root.join(p)
        }
    };
    let lexical = normalize(&joined);
    if !lexical.starts_with(&root) {
        return Err(escape());
    }

    let (existing, rest) = split_existing(&lexical);
    let resolved = match tokio::fs::canonicalize(&existing).await {
        Ok(real) => real.join(rest),
        Err(_) => lexical,
    };
    if !resolved.starts_with(&root) {
        return Err(escape());
    }
    Ok(resolved)
}

/// Fold `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Deepest ancestor that exists, and the remainder below it
fn split_existing(path: &Path) -> (PathBuf, PathBuf) {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }
    let rest: PathBuf = rest.into_iter().rev().collect();
    (existing, rest)
}
