//! Image build commands - package the server into a container image.

use anyhow::Result;

use crate::config::Config;
use crate::process::{run_checked, Cmd, Runner};
use crate::timing::Timer;
use crate::workspace::Workspace;

/// How the image obtains the server binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    /// Compile inside the builder image.
    Source,
    /// Copy binaries staged by `build`.
    Prebuilt,
}

impl BuildType {
    /// Value of the `BUILD_TYPE` build argument.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::Source => "source",
            BuildType::Prebuilt => "prebuilt",
        }
    }
}

/// The `docker build` invocation for `build_type`.
pub fn docker_build_cmd(
    workspace: &Workspace,
    config: &Config,
    build_type: BuildType,
) -> Result<Cmd> {
    let extra = config.extra_build_args()?;
    Ok(Cmd::new("docker")
        .arg("build")
        .arg("-f")
        .arg_path(&workspace.image_definition())
        .arg("--build-arg")
        .arg(format!("BUILD_TYPE={}", build_type.as_str()))
        .arg("--build-arg")
        .arg(format!("BUILDER_IMAGE={}", config.builder_image()))
        .arg("--build-arg")
        .arg(format!("RUNTIME_IMAGE={}", config.runtime_image()))
        .args(extra)
        .arg("-t")
        .arg(config.image_ref())
        .arg(".")
        .dir(workspace.root()))
}

/// Execute `docker-build-from-source` or `docker-build-from-artifacts`.
pub fn cmd_docker_build(
    workspace: &Workspace,
    config: &Config,
    runner: &dyn Runner,
    build_type: BuildType,
) -> Result<()> {
    let timer = Timer::start(&format!("docker build ({})", build_type.as_str()));
    let cmd = docker_build_cmd(workspace, config, build_type)?;
    run_checked(runner, &cmd)?;
    println!("Built {}", config.image_ref());
    timer.finish();
    Ok(())
}
