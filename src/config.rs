//! Layered configuration for shipwright.
//!
//! Settings are resolved from, lowest precedence first:
//! 1. built-in defaults
//! 2. `shipwright.env` (maintainer layer, committed)
//! 3. `.env` (local layer, created by `shipwright init`)
//! 4. explicit overrides (process environment, then `KEY=VALUE` arguments)
//!
//! Resolution is a pure merge of those layers. Nothing is exported into the
//! process environment, so later steps cannot observe a half-applied layer.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Error;
use crate::workspace::Workspace;

/// One configuration source: raw `KEY=VALUE` pairs.
pub type Layer = HashMap<String, String>;

/// Recognized configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigKey {
    /// Image the server is compiled in for source builds.
    BuilderImage,
    /// Base image of the packaged server.
    RuntimeImage,
    /// Extra arguments appended to `docker build`.
    DockerBuildArgs,
    ImageName,
    ImageTag,
    /// Whether the workflow emulator pulls images before running.
    ActPull,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::BuilderImage,
        ConfigKey::RuntimeImage,
        ConfigKey::DockerBuildArgs,
        ConfigKey::ImageName,
        ConfigKey::ImageTag,
        ConfigKey::ActPull,
    ];

    /// Variable name as written in layer files and the environment.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::BuilderImage => "BUILDER_IMAGE",
            ConfigKey::RuntimeImage => "RUNTIME_IMAGE",
            ConfigKey::DockerBuildArgs => "DOCKER_BUILD_ARGS",
            ConfigKey::ImageName => "IMAGE_NAME",
            ConfigKey::ImageTag => "IMAGE_TAG",
            ConfigKey::ActPull => "ACT_PULL",
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            ConfigKey::BuilderImage => "rust:1-bookworm",
            ConfigKey::RuntimeImage => "debian:bookworm-slim",
            ConfigKey::DockerBuildArgs => "",
            ConfigKey::ImageName => "server",
            ConfigKey::ImageTag => "latest",
            ConfigKey::ActPull => "false",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

/// Layer a setting was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Default,
    Maintainer,
    Local,
    Override,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Source::Default => "default",
            Source::Maintainer => "shipwright.env",
            Source::Local => ".env",
            Source::Override => "override",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub value: String,
    pub source: Source,
}

/// Effective configuration for one invocation.
///
/// Built once by [`Config::resolve`] or [`Config::load`] and read-only after.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Config {
    settings: BTreeMap<ConfigKey, Setting>,
}

impl Config {
    /// Merge the layers. Higher layers win key by key; unknown keys are ignored.
    pub fn resolve(maintainer: &Layer, local: &Layer, overrides: &Layer) -> Self {
        let layers = [
            (Source::Override, overrides),
            (Source::Local, local),
            (Source::Maintainer, maintainer),
        ];

        let settings = ConfigKey::ALL
            .into_iter()
            .map(|key| {
                let setting = layers
                    .iter()
                    .find_map(|(source, layer)| {
                        layer.get(key.name()).map(|value| Setting {
                            value: value.clone(),
                            source: *source,
                        })
                    })
                    .unwrap_or_else(|| Setting {
                        value: key.default_value().to_string(),
                        source: Source::Default,
                    });
                (key, setting)
            })
            .collect();

        Self { settings }
    }

    /// Read both layer files from the workspace and merge them with `overrides`.
    ///
    /// Never fails: a missing or unreadable file is an empty layer.
    pub fn load(workspace: &Workspace, overrides: &Layer) -> Self {
        let maintainer = read_layer(&workspace.maintainer_config());
        let local = read_layer(&workspace.env_file());
        Self::resolve(&maintainer, &local, overrides)
    }

    pub fn get(&self, key: ConfigKey) -> &str {
        self.settings
            .get(&key)
            .map(|s| s.value.as_str())
            .unwrap_or_else(|| key.default_value())
    }

    pub fn source(&self, key: ConfigKey) -> Source {
        self.settings
            .get(&key)
            .map(|s| s.source)
            .unwrap_or(Source::Default)
    }

    pub fn builder_image(&self) -> &str {
        self.get(ConfigKey::BuilderImage)
    }

    pub fn runtime_image(&self) -> &str {
        self.get(ConfigKey::RuntimeImage)
    }

    /// `IMAGE_NAME:IMAGE_TAG`
    pub fn image_ref(&self) -> String {
        format!(
            "{}:{}",
            self.get(ConfigKey::ImageName),
            self.get(ConfigKey::ImageTag)
        )
    }

    /// `DOCKER_BUILD_ARGS` split with shell quoting rules.
    pub fn extra_build_args(&self) -> Result<Vec<String>, Error> {
        let raw = self.get(ConfigKey::DockerBuildArgs);
        shell_words::split(raw).map_err(|e| Error::InvalidSetting {
            key: ConfigKey::DockerBuildArgs.name(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// `ACT_PULL` as a boolean.
    pub fn pull_images(&self) -> Result<bool, Error> {
        let raw = self.get(ConfigKey::ActPull);
        parse_bool(raw).ok_or_else(|| Error::InvalidSetting {
            key: ConfigKey::ActPull.name(),
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        })
    }

    /// Print configuration with the layer each value came from.
    pub fn print(&self) {
        println!("Configuration:");
        for key in ConfigKey::ALL {
            println!(
                "  {:<18} {:<28} ({})",
                key.name(),
                format!("{:?}", self.get(key)),
                self.source(key)
            );
        }
    }
}

/// Parse a `KEY=VALUE` layer file. Missing or unreadable files yield an empty layer.
pub fn read_layer(path: &Path) -> Layer {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "config layer skipped");
            return Layer::new();
        }
    };

    let mut layer = Layer::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                layer.insert(key, value);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed config line");
            }
        }
    }
    layer
}

/// Recognized keys present in the process environment.
pub fn overrides_from_env() -> Layer {
    std::env::vars()
        .filter(|(key, _)| ConfigKey::from_name(key).is_some())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
