//! Emulate-workflow command - replays the release workflow locally with `act`.
//!
//! Order of operations:
//! 1. warn when the secrets directory is missing (the workflow may still run)
//! 2. empty the artifact-server scratch directory
//! 3. link the fixed secrets mount point to the secrets directory
//! 4. run the emulator
//! 5. remove the link, whatever step 4 did
//!
//! Failures in 2 or 3 stop before the emulator starts. SIGINT, SIGTERM and
//! SIGHUP are held from before step 2 until after step 5; one that arrives
//! anywhere in between stops the run at the next step boundary (or stops the
//! emulator), the link is still removed, and the command reports the signal.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::WalkDir;

use crate::config::{Config, ConfigKey};
use crate::error::Error;
use crate::mount::SecretsMount;
use crate::process::{ensure_success, Cmd, Interrupts, Privilege, Runner};
use crate::workspace::{Workspace, ARTIFACT_SCRATCH_DIR, SECRETS_MOUNT_POINT};

/// Host-side resources used by an emulation run.
#[derive(Debug, Clone)]
pub struct EmulationHost {
    /// Fixed path the workflow reads secrets from.
    pub mount_point: PathBuf,
    /// Artifact-server directory shared with the emulator.
    pub scratch_dir: PathBuf,
    pub privilege: Privilege,
    /// Emulator executable.
    pub emulator: String,
}

impl EmulationHost {
    /// Standard host paths, `sudo` if available.
    pub fn detect() -> Self {
        Self {
            mount_point: PathBuf::from(SECRETS_MOUNT_POINT),
            scratch_dir: PathBuf::from(ARTIFACT_SCRATCH_DIR),
            privilege: Privilege::detect(),
            emulator: "act".to_string(),
        }
    }
}

/// The emulator invocation for the release workflow.
pub fn emulator_cmd(workspace: &Workspace, config: &Config, host: &EmulationHost) -> Result<Cmd> {
    let pull = config.pull_images()?;
    let mount = host.mount_point.display();
    Ok(Cmd::new(&host.emulator)
        .arg("-W")
        .arg_path(&workspace.release_workflow())
        .arg("--container-options")
        .arg(format!("-v {mount}:{mount}:ro"))
        .arg("--artifact-server-path")
        .arg_path(&host.scratch_dir)
        .arg(format!("--pull={pull}"))
        .arg("--env")
        .arg(format!("{}={pull}", ConfigKey::ActPull.name()))
        .arg("--env")
        .arg(format!(
            "{}={}",
            ConfigKey::DockerBuildArgs.name(),
            config.get(ConfigKey::DockerBuildArgs)
        ))
        .dir(workspace.root()))
}

/// Execute the emulate-workflow command.
///
/// Returns the emulator's own failure when it exits non-zero, or
/// [`Error::Interrupted`] when a termination signal arrived during the run.
/// A failed mount teardown is reported but never replaces either.
pub fn cmd_emulate(
    workspace: &Workspace,
    config: &Config,
    runner: &dyn Runner,
    host: &EmulationHost,
) -> Result<()> {
    let emulator = emulator_cmd(workspace, config, host)?;
    // Declared before the mount so it outlives the mount's Drop.
    let mut interrupts = Interrupts::install()?;

    let secrets = workspace.secrets_dir();
    if !secrets.is_dir() {
        warn!(path = %secrets.display(), "secrets directory missing");
        println!(
            "[WARN] {} not found; the workflow will only see non-secret variables.",
            secrets.display()
        );
    }

    clear_scratch(&host.scratch_dir)?;
    stop_if_interrupted(&mut interrupts)?;

    let mount = SecretsMount::acquire(&host.mount_point, &secrets, host.privilege, runner)?;
    let result = stop_if_interrupted(&mut interrupts).and_then(|()| {
        let status = runner.run_within(&emulator, &mut interrupts)?;
        ensure_success(emulator.program(), status)
    });

    if let Err(e) = mount.release() {
        error!(error = %e, "secrets mount cleanup failed");
        eprintln!("[WARN] {}. Remove it by hand before the next run.", e);
    }

    stop_if_interrupted(&mut interrupts)?;
    result
}

fn stop_if_interrupted(interrupts: &mut Interrupts) -> Result<()> {
    match interrupts.pending() {
        Some(signal) => {
            warn!(%signal, "emulation interrupted");
            Err(Error::Interrupted { signal }.into())
        }
        None => Ok(()),
    }
}

/// Empty `dir`, creating it if needed. The directory itself is kept.
pub fn clear_scratch(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    for entry in entries {
        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        removed.with_context(|| format!("Failed to remove stale artifact {}", path.display()))?;
    }
    Ok(())
}
