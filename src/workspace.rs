//! Project layout.
//!
//! Every path shipwright reads or writes inside the project lives here, so the
//! operations never hardcode a location twice.

use std::path::{Path, PathBuf};

/// Cargo package that produces the server binaries.
pub const SERVER_PACKAGE: &str = "server";

/// Server daemon binary.
pub const DAEMON_BINARY: &str = "serverd";

/// Admin CLI binary.
pub const ADMIN_BINARY: &str = "serverctl";

/// Port the server listens on inside the container.
pub const SERVICE_PORT: u16 = 8080;

/// Where the runtime configuration is mounted inside the container.
pub const CONTAINER_CONFIG_PATH: &str = "/etc/server/config.toml";

/// Fixed host path the release workflow expects secrets under.
pub const SECRETS_MOUNT_POINT: &str = "/run/shipwright-secrets";

/// Artifact-server scratch directory handed to the workflow emulator.
pub const ARTIFACT_SCRATCH_DIR: &str = "/tmp/shipwright-artifacts";

/// Paths of a project checkout.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maintainer-defined configuration layer (committed).
    pub fn maintainer_config(&self) -> PathBuf {
        self.root.join("shipwright.env")
    }

    /// Locally generated environment layer.
    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn env_template(&self) -> PathBuf {
        self.root.join(".env.example")
    }

    /// Runtime configuration mounted into the container by `run`.
    pub fn runtime_config(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn runtime_config_template(&self) -> PathBuf {
        self.root.join("config.example.toml")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    /// Compiled binaries waiting to be packaged.
    pub fn staging_dir(&self) -> PathBuf {
        self.output_dir().join("bin")
    }

    pub fn staged_binaries(&self) -> [PathBuf; 2] {
        let staging = self.staging_dir();
        [staging.join(DAEMON_BINARY), staging.join(ADMIN_BINARY)]
    }

    /// Native build cache.
    pub fn build_cache(&self) -> PathBuf {
        self.root.join("target")
    }

    /// Binaries as produced by a release build.
    pub fn compiled_binaries(&self) -> [PathBuf; 2] {
        let release = self.build_cache().join("release");
        [release.join(DAEMON_BINARY), release.join(ADMIN_BINARY)]
    }

    pub fn image_definition(&self) -> PathBuf {
        self.root.join("Dockerfile")
    }

    pub fn release_workflow(&self) -> PathBuf {
        self.root.join(".github/workflows/release.yml")
    }

    /// Operator-provided secrets exposed to the emulated workflow.
    pub fn secrets_dir(&self) -> PathBuf {
        self.root.join(".secrets")
    }
}
