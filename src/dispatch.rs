//! Command dispatch.
//!
//! Turns a command name plus overrides into one executed operation:
//! parse the name, resolve configuration, check preconditions, run.
//! An unknown name stops at the first step with nothing else touched.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::commands::{self, BuildType, Command, EmulationHost};
use crate::config::{Config, ConfigKey, Layer};
use crate::preconditions::{self, FilesystemView, HostFs};
use crate::process::Runner;
use crate::prompt::Prompt;
use crate::workspace::Workspace;

/// Everything an operation may touch, bundled for one invocation.
pub struct Dispatcher<'a> {
    workspace: Workspace,
    runner: &'a dyn Runner,
    prompt: &'a dyn Prompt,
    fs: &'a dyn FilesystemView,
    host: EmulationHost,
    json: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        workspace: Workspace,
        runner: &'a dyn Runner,
        prompt: &'a dyn Prompt,
        host: EmulationHost,
    ) -> Self {
        Self {
            workspace,
            runner,
            prompt,
            fs: &HostFs,
            host,
            json: false,
        }
    }

    /// Use a different filesystem view for precondition checks.
    pub fn with_fs(mut self, fs: &'a dyn FilesystemView) -> Self {
        self.fs = fs;
        self
    }

    /// Print `help` output as JSON.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run the command called `name`.
    ///
    /// Tool failures come back as [`crate::error::Error::SubprocessFailure`]
    /// carrying the tool's exit code unchanged.
    pub fn dispatch(&self, name: &str, overrides: &Layer) -> Result<()> {
        let command: Command = name.parse()?;

        for key in overrides.keys() {
            if ConfigKey::from_name(key).is_none() {
                debug!(key = %key, "ignoring unrecognized override");
            }
        }

        let config = Config::load(&self.workspace, overrides);
        debug!(?config, "configuration resolved");

        preconditions::check(command, &self.workspace, self.fs)?;

        info!(%command, root = %self.workspace.root().display(), "running");
        self.execute(command, &config)
            .with_context(|| format!("{} failed", command))
    }

    fn execute(&self, command: Command, config: &Config) -> Result<()> {
        let ws = &self.workspace;
        match command {
            Command::Init => commands::cmd_init(ws).map(|_| ()),
            Command::Clean => commands::cmd_clean(ws, self.prompt).map(|_| ()),
            Command::Build => commands::cmd_build(ws, self.runner),
            Command::Test => commands::cmd_test(ws, self.runner),
            Command::DockerBuildFromSource => {
                commands::cmd_docker_build(ws, config, self.runner, BuildType::Source)
            }
            Command::DockerBuildFromArtifacts => {
                commands::cmd_docker_build(ws, config, self.runner, BuildType::Prebuilt)
            }
            Command::Run => commands::cmd_run(ws, config, self.runner),
            Command::Shell => commands::cmd_shell(config, self.runner),
            Command::EmulateWorkflow => commands::cmd_emulate(ws, config, self.runner, &self.host),
            Command::Help => commands::cmd_help(config, self.json),
        }
    }
}
