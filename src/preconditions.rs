//! Per-command precondition checks.
//!
//! A command that needs generated files refuses to start when they are
//! missing and names the command that produces them.

use std::path::{Path, PathBuf};

use crate::commands::Command;
use crate::error::Error;
use crate::workspace::Workspace;

/// Read-only view of the filesystem used for precondition checks.
pub trait FilesystemView {
    fn exists(&self, path: &Path) -> bool;
}

/// The host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl FilesystemView for HostFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// A file a command needs, and how to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: PathBuf,
    pub remediation: &'static str,
}

/// Files `command` needs before it may run, in the order they are checked.
pub fn requirements(command: Command, workspace: &Workspace) -> Vec<Requirement> {
    match command {
        Command::Run => vec![
            Requirement {
                path: workspace.runtime_config(),
                remediation: "shipwright init",
            },
            Requirement {
                path: workspace.env_file(),
                remediation: "shipwright init",
            },
        ],
        Command::DockerBuildFromArtifacts => workspace
            .staged_binaries()
            .into_iter()
            .map(|path| Requirement {
                path,
                remediation: "shipwright build",
            })
            .collect(),
        Command::Init
        | Command::Clean
        | Command::Build
        | Command::Test
        | Command::DockerBuildFromSource
        | Command::Shell
        | Command::EmulateWorkflow
        | Command::Help => Vec::new(),
    }
}

/// Fail with [`Error::MissingPrecondition`] on the first absent requirement.
pub fn check(command: Command, workspace: &Workspace, fs: &dyn FilesystemView) -> Result<(), Error> {
    match requirements(command, workspace)
        .into_iter()
        .find(|req| !fs.exists(&req.path))
    {
        Some(missing) => Err(Error::MissingPrecondition {
            what: display_relative(workspace, &missing.path),
            remediation: missing.remediation.to_string(),
        }),
        None => Ok(()),
    }
}

fn display_relative(workspace: &Workspace, path: &Path) -> String {
    path.strip_prefix(workspace.root())
        .unwrap_or(path)
        .display()
        .to_string()
}
