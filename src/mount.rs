//! Privileged secrets mount for workflow emulation.
//!
//! The release workflow reads secrets from a fixed host path. For the length
//! of one emulation that path is a symlink to the operator's secrets
//! directory. [`SecretsMount`] owns the link: it is created by
//! [`SecretsMount::acquire`] and removed by [`SecretsMount::release`], or by
//! `Drop` on any path that skips the explicit release (early return, panic).
//!
//! The `sudo` commands behind acquire and release always run to completion.
//! A signal that arrives meanwhile is left for the caller's
//! [`Interrupts`](crate::process::Interrupts) scope to report.
//!
//! There is no locking. Two emulations on one host share the same path.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::Error;
use crate::process::{run_to_completion_checked, Cmd, Privilege, Runner};

/// A live symlink at the mount point. Removed when released or dropped.
pub struct SecretsMount<'a> {
    mount_point: PathBuf,
    privilege: Privilege,
    runner: &'a dyn Runner,
    released: bool,
}

impl<'a> SecretsMount<'a> {
    /// Replace whatever is at `mount_point` with a link to `secrets_dir`.
    pub fn acquire(
        mount_point: &Path,
        secrets_dir: &Path,
        privilege: Privilege,
        runner: &'a dyn Runner,
    ) -> Result<Self> {
        remove_link(mount_point, privilege, runner)
            .with_context(|| format!("Failed to clear stale mount at {}", mount_point.display()))?;

        let linked = match privilege {
            Privilege::Sudo => {
                let ln = Cmd::new("sudo")
                    .args(["ln", "-s"])
                    .arg_path(secrets_dir)
                    .arg_path(mount_point);
                run_to_completion_checked(runner, &ln)
            }
            Privilege::Direct => symlink(secrets_dir, mount_point).map_err(anyhow::Error::from),
        };
        linked.with_context(|| {
            format!(
                "Failed to link {} -> {}",
                mount_point.display(),
                secrets_dir.display()
            )
        })?;

        info!(
            mount = %mount_point.display(),
            target = %secrets_dir.display(),
            "secrets mount acquired"
        );
        Ok(Self {
            mount_point: mount_point.to_path_buf(),
            privilege,
            runner,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.mount_point
    }

    /// Remove the link now and report whether that worked.
    pub fn release(mut self) -> Result<(), Error> {
        self.released = true;
        self.teardown()
    }

    fn teardown(&self) -> Result<(), Error> {
        remove_link(&self.mount_point, self.privilege, self.runner).map_err(|e| {
            Error::CleanupFailure {
                path: self.mount_point.clone(),
                reason: format!("{:#}", e),
            }
        })?;
        info!(mount = %self.mount_point.display(), "secrets mount released");
        Ok(())
    }
}

impl Drop for SecretsMount<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.teardown() {
            error!(error = %e, "secrets mount cleanup failed");
            eprintln!("[WARN] {}", e);
        }
    }
}

/// Remove the link at `path` if there is one. Absent is fine.
fn remove_link(path: &Path, privilege: Privilege, runner: &dyn Runner) -> Result<()> {
    match privilege {
        Privilege::Sudo => {
            run_to_completion_checked(runner, &Cmd::new("sudo").args(["rm", "-f"]).arg_path(path))
        }
        Privilege::Direct => match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stale mount");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SystemRunner;
    use std::cell::RefCell;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::TempDir;

    /// Accepts only uninterruptible runs and records them.
    #[derive(Default)]
    struct CompletionOnly(RefCell<Vec<String>>);

    impl Runner for CompletionOnly {
        fn run(&self, cmd: &Cmd) -> Result<ExitStatus> {
            anyhow::bail!("'{}' was run interruptibly", cmd)
        }

        fn run_to_completion(&self, cmd: &Cmd) -> Result<ExitStatus> {
            self.0.borrow_mut().push(cmd.to_string());
            Ok(ExitStatus::from_raw(0))
        }
    }

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().unwrap();
        let secrets = temp.path().join("secrets");
        fs::create_dir(&secrets).unwrap();
        let mount = temp.path().join("mount");
        (temp, secrets, mount)
    }

    #[test]
    fn test_acquire_links_and_release_removes() {
        let (_temp, secrets, mount) = dirs();
        let guard = SecretsMount::acquire(&mount, &secrets, Privilege::Direct, &SystemRunner).unwrap();
        assert_eq!(fs::read_link(&mount).unwrap(), secrets);

        guard.release().unwrap();
        assert!(fs::symlink_metadata(&mount).is_err());
    }

    #[test]
    fn test_drop_removes_link() {
        let (_temp, secrets, mount) = dirs();
        {
            let _guard =
                SecretsMount::acquire(&mount, &secrets, Privilege::Direct, &SystemRunner).unwrap();
            assert!(mount.is_symlink());
        }
        assert!(fs::symlink_metadata(&mount).is_err());
    }

    #[test]
    fn test_stale_link_replaced() {
        let (temp, secrets, mount) = dirs();
        symlink(temp.path().join("old-secrets"), &mount).unwrap();

        let guard = SecretsMount::acquire(&mount, &secrets, Privilege::Direct, &SystemRunner).unwrap();
        assert_eq!(fs::read_link(guard.path()).unwrap(), secrets);
    }

    #[test]
    fn test_release_after_external_removal_is_ok() {
        let (_temp, secrets, mount) = dirs();
        let guard = SecretsMount::acquire(&mount, &secrets, Privilege::Direct, &SystemRunner).unwrap();
        fs::remove_file(&mount).unwrap();
        assert!(guard.release().is_ok());
    }

    #[test]
    fn test_unremovable_stale_entry_aborts_acquire() {
        let (_temp, secrets, mount) = dirs();
        // A directory cannot be removed with remove_file, like `rm -f` on a dir.
        fs::create_dir(&mount).unwrap();
        assert!(SecretsMount::acquire(&mount, &secrets, Privilege::Direct, &SystemRunner).is_err());
        assert!(mount.is_dir());
    }

    #[test]
    fn test_sudo_commands_run_to_completion() {
        let runner = CompletionOnly::default();
        let mount = Path::new("/run/shipwright-secrets");
        let guard =
            SecretsMount::acquire(mount, Path::new("/work/.secrets"), Privilege::Sudo, &runner).unwrap();
        guard.release().unwrap();

        assert_eq!(
            *runner.0.borrow(),
            [
                "sudo rm -f /run/shipwright-secrets",
                "sudo ln -s /work/.secrets /run/shipwright-secrets",
                "sudo rm -f /run/shipwright-secrets",
            ]
        );
    }
}
