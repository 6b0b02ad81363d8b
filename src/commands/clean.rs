//! Clean command - removes generated artifacts.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Error;
use crate::prompt::Prompt;
use crate::workspace::Workspace;

/// Execute the clean command.
///
/// Deletes nothing unless the operator confirms.
pub fn cmd_clean(workspace: &Workspace, prompt: &dyn Prompt) -> Result<Vec<PathBuf>> {
    let question = format!(
        "Remove out/, target/ and result symlinks in {}?",
        workspace.root().display()
    );
    if !prompt.confirm(&question)? {
        return Err(Error::UserAborted {
            action: "clean".to_string(),
        }
        .into());
    }

    let mut removed = Vec::new();

    for dir in [workspace.output_dir(), workspace.build_cache()] {
        if dir.is_dir() {
            println!("Removing {}...", dir.display());
            fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
            removed.push(dir);
        }
    }

    for link in result_symlinks(workspace.root())? {
        println!("Removing {}...", link.display());
        fs::remove_file(&link).with_context(|| format!("Failed to remove {}", link.display()))?;
        removed.push(link);
    }

    if removed.is_empty() {
        println!("Nothing to clean.");
    } else {
        println!("Clean complete.");
    }
    Ok(removed)
}

/// Top-level `result` / `result-*` symlinks left by build tools.
fn result_symlinks(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list {}", root.display()))?;

    Ok(entries
        .into_iter()
        .filter(|e| e.path_is_symlink())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name == "result" || name.starts_with("result-")
        })
        .map(|e| e.into_path())
        .collect())
}
