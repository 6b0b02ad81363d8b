//! Init command - creates local config files from their templates.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::error::Error;
use crate::workspace::Workspace;

/// What `init` did with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyPresent,
}

/// Execute the init command.
///
/// Existing files are never overwritten, so running it again is harmless.
pub fn cmd_init(workspace: &Workspace) -> Result<Vec<InitOutcome>> {
    let pairs = [
        (workspace.env_template(), workspace.env_file()),
        (
            workspace.runtime_config_template(),
            workspace.runtime_config(),
        ),
    ];

    pairs
        .iter()
        .map(|(template, target)| init_file(workspace, template, target))
        .collect()
}

fn init_file(workspace: &Workspace, template: &Path, target: &Path) -> Result<InitOutcome> {
    let name = relative(workspace, target);
    if target.exists() {
        println!("{} already exists, leaving it untouched.", name);
        return Ok(InitOutcome::AlreadyPresent);
    }

    if !template.exists() {
        return Err(Error::MissingPrecondition {
            what: format!("Template {}", relative(workspace, template)),
            remediation: "git checkout -- .".to_string(),
        }
        .into());
    }

    println!("Creating {} from {}...", name, relative(workspace, template));
    fs::copy(template, target)
        .with_context(|| format!("Failed to copy {} to {}", template.display(), target.display()))?;
    Ok(InitOutcome::Created)
}

fn relative(workspace: &Workspace, path: &Path) -> String {
    path.strip_prefix(workspace.root())
        .unwrap_or(path)
        .display()
        .to_string()
}
