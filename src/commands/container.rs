//! Run and shell commands - start the packaged image.

use anyhow::Result;

use crate::config::Config;
use crate::process::{run_checked, Cmd, Runner};
use crate::workspace::{Workspace, CONTAINER_CONFIG_PATH, SERVICE_PORT};

pub fn run_cmd(workspace: &Workspace, config: &Config) -> Cmd {
    let mount = format!(
        "{}:{}:ro",
        workspace.runtime_config().display(),
        CONTAINER_CONFIG_PATH
    );
    Cmd::new("docker")
        .args(["run", "--rm", "-it"])
        .arg("-p")
        .arg(format!("{port}:{port}", port = SERVICE_PORT))
        .arg("-v")
        .arg(mount)
        .arg(config.image_ref())
}

pub fn shell_cmd(config: &Config) -> Cmd {
    Cmd::new("docker")
        .args(["run", "--rm", "-it", "--entrypoint", "/bin/sh"])
        .arg(config.image_ref())
}

/// Execute the run command.
pub fn cmd_run(workspace: &Workspace, config: &Config, runner: &dyn Runner) -> Result<()> {
    println!(
        "Starting {} on port {} (Ctrl+C to stop)",
        config.image_ref(),
        SERVICE_PORT
    );
    run_checked(runner, &run_cmd(workspace, config))
}

/// Execute the shell command.
pub fn cmd_shell(config: &Config, runner: &dyn Runner) -> Result<()> {
    run_checked(runner, &shell_cmd(config))
}
