//! Shared, read-only configuration for one cross-compilation run.
//!
//! A [`BuildContext`] is assembled once from the command line, wrapped in an
//! `Arc`, and handed to every image build. Nothing mutates it afterwards.

use crate::container::{ContainerLimits, Volume};
use crate::error::{CliError, CrossError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default icon file, relative to the work dir
pub const DEFAULT_ICON: &str = "Icon.png";

/// Settings shared by every image of a run
#[derive(Debug, Clone)]
pub struct BuildContext {
    name: String,
    app_id: Option<String>,
    app_version: String,
    app_build: u32,
    release: bool,
    icon: PathBuf,
    package: String,
    volume: Volume,
    env: BTreeMap<String, String>,
    pull: bool,
    limits: ContainerLimits,
}

impl BuildContext {
    /// Context for application `name` using `volume`, with debug packaging
    /// and the default icon.
    pub fn new(name: impl Into<String>, volume: Volume) -> Result<Self, CrossError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CliError::InvalidArguments {
                reason: "application name cannot be empty".to_string(),
            }
            .into());
        }
        let icon = volume.work_dir_host().join(DEFAULT_ICON);

        Ok(Self {
            name,
            app_id: None,
            app_version: "1.0.0".to_string(),
            app_build: 1,
            release: false,
            icon,
            package: ".".to_string(),
            volume,
            env: BTreeMap::new(),
            pull: false,
            limits: ContainerLimits::default(),
        })
    }

    /// Set the application id (reverse-DNS)
    pub fn with_app_id(mut self, app_id: Option<String>) -> Self {
        self.app_id = app_id.filter(|id| !id.is_empty());
        self
    }

    /// Set version and build number
    pub fn with_version(mut self, app_version: impl Into<String>, app_build: u32) -> Self {
        self.app_version = app_version.into();
        self.app_build = app_build;
        self
    }

    /// Package for release instead of debug
    pub fn with_release(mut self, release: bool) -> Self {
        self.release = release;
        self
    }

    /// Icon path; relative paths resolve against the host work dir
    pub fn with_icon(mut self, icon: &Path) -> Self {
        self.icon = if icon.is_absolute() {
            icon.to_path_buf()
        } else {
            self.volume.work_dir_host().join(icon)
        };
        self
    }

    /// Package directory, relative to the work dir
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Global environment overrides copied into every image
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Pull images before building
    pub fn with_pull(mut self, pull: bool) -> Self {
        self.pull = pull;
        self
    }

    /// Container resource limits
    pub fn with_limits(mut self, limits: ContainerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Application name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Application id, when set
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    /// Application version
    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// Build number
    pub fn app_build(&self) -> u32 {
        self.app_build
    }

    /// Whether release packaging is requested
    pub fn release(&self) -> bool {
        self.release
    }

    /// Host path of the icon
    pub fn icon(&self) -> &Path {
        &self.icon
    }

    /// Package directory relative to the work dir
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Directory layout
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Global environment overrides
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Whether images are pulled before building
    pub fn pull(&self) -> bool {
        self.pull
    }

    /// Container resource limits
    pub fn limits(&self) -> &ContainerLimits {
        &self.limits
    }
}

/// Parse `KEY=VALUE` pairs. Later entries win.
pub fn parse_env_overrides(pairs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    let mut env = BTreeMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                env.insert(key.trim().to_string(), value.to_string());
            }
            _ => {
                return Err(CliError::InvalidArguments {
                    reason: format!("invalid environment override {:?}, expected KEY=VALUE", pair),
                });
            }
        }
    }
    Ok(env)
}
