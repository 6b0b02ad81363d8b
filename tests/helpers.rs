//! Shared test utilities for shipwright tests.

#![allow(dead_code)]

use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tempfile::TempDir;

use shipwright::commands::EmulationHost;
use shipwright::dispatch::Dispatcher;
use shipwright::preconditions::FilesystemView;
use shipwright::process::{Cmd, Privilege, Runner};
use shipwright::prompt::Prompt;
use shipwright::workspace::Workspace;

/// A project checkout plus host paths, all inside one temp dir.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub workspace: Workspace,
    pub host: EmulationHost,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("project");
        let host_dir = temp_dir.path().join("host");
        fs::create_dir_all(&root).expect("Failed to create project dir");
        fs::create_dir_all(&host_dir).expect("Failed to create host dir");

        let host = EmulationHost {
            mount_point: host_dir.join("secrets-mount"),
            scratch_dir: host_dir.join("artifacts"),
            privilege: Privilege::Direct,
            emulator: "act".to_string(),
        };

        Self {
            _temp_dir: temp_dir,
            workspace: Workspace::new(root),
            host,
        }
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    /// Write the templates `init` copies from.
    pub fn seed_templates(&self) {
        fs::write(self.workspace.env_template(), "IMAGE_TAG=dev\n").expect("write .env.example");
        fs::write(
            self.workspace.runtime_config_template(),
            "listen = \"0.0.0.0:8080\"\n",
        )
        .expect("write config.example.toml");
    }

    pub fn seed_secrets(&self) -> PathBuf {
        let secrets = self.workspace.secrets_dir();
        fs::create_dir_all(&secrets).expect("create .secrets");
        fs::write(secrets.join("GITHUB_TOKEN"), "token").expect("write secret");
        secrets
    }

    /// Put both binaries in the staging area, as `build` would.
    pub fn seed_staging(&self) {
        fs::create_dir_all(self.workspace.staging_dir()).expect("create staging");
        for binary in self.workspace.staged_binaries() {
            fs::write(binary, "binary").expect("write staged binary");
        }
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write file");
    }

    /// Write an executable shell script at the project root.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("Failed to write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    }

    pub fn dispatcher<'a>(&self, runner: &'a dyn Runner, prompt: &'a dyn Prompt) -> Dispatcher<'a> {
        Dispatcher::new(self.workspace.clone(), runner, prompt, self.host.clone())
    }
}

/// Exit status with the given code.
pub fn exit(code: i32) -> ExitStatus {
    ExitStatus::from_raw(code << 8)
}

type Behavior = Box<dyn Fn(&Cmd) -> Result<ExitStatus>>;

/// Runner that records invocations instead of spawning processes.
pub struct RecordingRunner {
    calls: RefCell<Vec<Cmd>>,
    behavior: Behavior,
}

impl RecordingRunner {
    /// Every tool exits 0.
    pub fn succeeding() -> Self {
        Self::with(|_| Ok(exit(0)))
    }

    pub fn with(behavior: impl Fn(&Cmd) -> Result<ExitStatus> + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            behavior: Box::new(behavior),
        }
    }

    pub fn calls(&self) -> Vec<Cmd> {
        self.calls.borrow().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.program().to_string())
            .collect()
    }
}

impl Runner for RecordingRunner {
    fn run(&self, cmd: &Cmd) -> Result<ExitStatus> {
        self.calls.borrow_mut().push(cmd.clone());
        (self.behavior)(cmd)
    }
}

/// Fixed answer to every confirmation.
pub struct Answer(pub bool);

impl Prompt for Answer {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.0)
    }
}

/// Prompt that counts how often it was asked.
#[derive(Default)]
pub struct CountingPrompt {
    pub asked: Cell<usize>,
}

impl Prompt for CountingPrompt {
    fn confirm(&self, _question: &str) -> Result<bool> {
        self.asked.set(self.asked.get() + 1);
        Ok(false)
    }
}

/// Filesystem view that counts queries and delegates to the host.
#[derive(Default)]
pub struct CountingFs {
    pub queries: Cell<usize>,
}

impl FilesystemView for CountingFs {
    fn exists(&self, path: &Path) -> bool {
        self.queries.set(self.queries.get() + 1);
        path.exists()
    }
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that nothing (not even a dangling link) exists at `path`.
pub fn assert_absent(path: &Path) {
    assert!(
        fs::symlink_metadata(path).is_err(),
        "Expected nothing at {}",
        path.display()
    );
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &Path) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );
    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(target, expected_target, "Symlink {} target", path.display());
}
