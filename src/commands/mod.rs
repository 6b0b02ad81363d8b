//! Command set and handlers.
//!
//! Each submodule implements one or more commands:
//! - `init` - Create local config files from templates
//! - `clean` - Remove generated artifacts (asks first)
//! - `build` - Compile the server and stage its binaries; run the test suite
//! - `image` - Build the container image from source or staged artifacts
//! - `container` - Run the image, or open a shell in it
//! - `emulate` - Replay the release workflow locally
//! - `help` - List commands and the effective configuration

pub mod build;
pub mod clean;
pub mod container;
pub mod emulate;
pub mod help;
pub mod image;
pub mod init;

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub use build::{cmd_build, cmd_test};
pub use clean::cmd_clean;
pub use container::{cmd_run, cmd_shell};
pub use emulate::{cmd_emulate, EmulationHost};
pub use help::cmd_help;
pub use image::{cmd_docker_build, BuildType};
pub use init::cmd_init;

/// Every operation shipwright can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Init,
    Clean,
    Build,
    Test,
    DockerBuildFromSource,
    DockerBuildFromArtifacts,
    Run,
    Shell,
    EmulateWorkflow,
    Help,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::Init,
        Command::Clean,
        Command::Build,
        Command::Test,
        Command::DockerBuildFromSource,
        Command::DockerBuildFromArtifacts,
        Command::Run,
        Command::Shell,
        Command::EmulateWorkflow,
        Command::Help,
    ];

    /// Name as typed on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::Clean => "clean",
            Command::Build => "build",
            Command::Test => "test",
            Command::DockerBuildFromSource => "docker-build-from-source",
            Command::DockerBuildFromArtifacts => "docker-build-from-artifacts",
            Command::Run => "run",
            Command::Shell => "shell",
            Command::EmulateWorkflow => "emulate-workflow",
            Command::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Init => "Create .env and config.toml from their templates",
            Command::Clean => "Remove out/, target/ and result symlinks (asks first)",
            Command::Build => "Compile the server in release mode and stage its binaries",
            Command::Test => "Run the native test suite",
            Command::DockerBuildFromSource => "Build the image, compiling inside the builder image",
            Command::DockerBuildFromArtifacts => "Build the image from binaries staged by 'build'",
            Command::Run => "Run the image with config.toml mounted",
            Command::Shell => "Open an interactive shell in the image",
            Command::EmulateWorkflow => "Replay the release workflow locally with act",
            Command::Help => "Show commands and the effective configuration",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| Error::InvalidCommand {
                name: s.to_string(),
            })
    }
}
