//! Build and test commands - native compilation of the server.

use anyhow::{bail, Context, Result};
use std::fs;

use crate::process::{run_checked, Cmd, Runner};
use crate::timing::Timer;
use crate::workspace::{Workspace, SERVER_PACKAGE};

/// Execute the build command.
///
/// Compiles the server in release mode, then copies the daemon and admin CLI
/// into the staging area. A compiler failure stops before staging; whatever
/// was staged by an earlier run is left alone.
pub fn cmd_build(workspace: &Workspace, runner: &dyn Runner) -> Result<()> {
    let timer = Timer::start("build");

    let cargo = Cmd::new("cargo")
        .args(["build", "--release", "-p", SERVER_PACKAGE])
        .dir(workspace.root());
    run_checked(runner, &cargo)?;

    let staging = workspace.staging_dir();
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    for (compiled, staged) in workspace
        .compiled_binaries()
        .iter()
        .zip(workspace.staged_binaries().iter())
    {
        if !compiled.exists() {
            bail!(
                "cargo succeeded but {} was not produced. Does the '{}' package still build it?",
                compiled.display(),
                SERVER_PACKAGE
            );
        }
        println!("Staging {}...", staged.display());
        fs::copy(compiled, staged).with_context(|| {
            format!("Failed to copy {} to {}", compiled.display(), staged.display())
        })?;
    }

    timer.finish();
    Ok(())
}

/// Execute the test command.
pub fn cmd_test(workspace: &Workspace, runner: &dyn Runner) -> Result<()> {
    let timer = Timer::start("test");
    run_checked(
        runner,
        &Cmd::new("cargo")
            .args(["test", "--workspace"])
            .dir(workspace.root()),
    )?;
    timer.finish();
    Ok(())
}
