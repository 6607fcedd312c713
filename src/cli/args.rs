//! Command line argument parsing and validation.
//!
//! Every build flag can also be set through a `KODEGEN_CROSS_*` environment
//! variable, so CI jobs can configure a run without long command lines.

use crate::container::{Architecture, ContainerLimits, Volume};
use crate::context::{BuildContext, DEFAULT_ICON, parse_env_overrides};
use crate::driver::{MAX_BUILD_RETRIES, RetryPolicy};
use crate::engine::AUTODETECT_ENGINE;
use crate::error::{CliError, Result};
use crate::process::DEFAULT_COMMAND_TIMEOUT;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cross-compile and package Fyne applications inside containers
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_cross",
    version,
    about = "Cross-compile and package Fyne applications inside containers",
    long_about = "Build a Fyne application for another OS inside docker, podman or a
Kubernetes cluster, one container per target architecture.

Usage:
  kodegen_bundler_cross freebsd
  kodegen_bundler_cross freebsd --arch amd64,arm64 --app-id io.example.calc
  kodegen_bundler_cross freebsd --engine podman --release ./cmd/calc"
)]
pub struct Args {
    /// Target to build
    #[command(subcommand)]
    pub command: Command,

    /// Echo container output while it runs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Supported targets
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and package a fyne application for the freebsd OS
    Freebsd(FreeBsdFlags),
}

/// Flags of the `freebsd` subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct FreeBsdFlags {
    /// Shared build flags
    #[command(flatten)]
    pub common: CommonFlags,

    /// Target architectures, comma separated (default: host architecture)
    #[arg(long, value_delimiter = ',', env = "KODEGEN_CROSS_ARCH")]
    pub arch: Vec<Architecture>,
}

/// Flags shared by every target
#[derive(clap::Args, Debug, Clone)]
pub struct CommonFlags {
    /// Container engine: docker, podman or kubernetes (default: autodetect)
    #[arg(long, env = "KODEGEN_CROSS_ENGINE")]
    pub engine: Option<String>,

    /// Custom image to use instead of the default one
    #[arg(long, env = "KODEGEN_CROSS_IMAGE")]
    pub image: Option<String>,

    /// Application name (default: package directory name)
    #[arg(long, env = "KODEGEN_CROSS_NAME")]
    pub name: Option<String>,

    /// Application ID used for distribution
    #[arg(long = "app-id", env = "KODEGEN_CROSS_APP_ID")]
    pub app_id: Option<String>,

    /// Version number in the form x, x.y or x.y.z
    #[arg(long = "app-version", default_value = "1.0.0")]
    pub app_version: String,

    /// Build number, greater than zero
    #[arg(long = "app-build", default_value_t = 1)]
    pub app_build: u32,

    /// Package for release instead of debug
    #[arg(long)]
    pub release: bool,

    /// Application icon, relative to the work dir
    #[arg(long, default_value = DEFAULT_ICON)]
    pub icon: PathBuf,

    /// Extra container environment, KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Pull the image before building
    #[arg(long, env = "KODEGEN_CROSS_PULL")]
    pub pull: bool,

    /// Host directory mounted as the Go cache
    #[arg(long, env = "KODEGEN_CROSS_CACHE")]
    pub cache: Option<PathBuf>,

    /// Host directory mounted as the work dir (default: current directory)
    #[arg(long, env = "KODEGEN_CROSS_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Container memory limit, e.g. 4g (default: half of host RAM)
    #[arg(long = "docker-memory", env = "KODEGEN_CROSS_DOCKER_MEMORY")]
    pub docker_memory: Option<String>,

    /// Container memory + swap limit (default: memory + 2g)
    #[arg(long = "docker-memory-swap", requires = "docker_memory")]
    pub docker_memory_swap: Option<String>,

    /// Container CPU limit, fractional allowed
    #[arg(long = "docker-cpus", requires = "docker_memory")]
    pub docker_cpus: Option<String>,

    /// Container process limit
    #[arg(long = "docker-pids-limit", default_value_t = 1000)]
    pub docker_pids_limit: u32,

    /// Seconds before a single container command is killed
    #[arg(long, env = "KODEGEN_CROSS_TIMEOUT", default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Extra attempts for a failed architecture (default: KODEGEN_CROSS_RETRY_BUILD or 0)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Package directory, relative to the work dir
    #[arg(value_name = "PACKAGE", default_value = ".")]
    pub package: String,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.verbose && self.quiet {
            return Err("--verbose and --quiet cannot be used together".to_string());
        }
        match &self.command {
            Command::Freebsd(flags) => flags.common.validate(),
        }
    }
}

impl CommonFlags {
    /// Engine token for the resolver; empty means autodetect
    pub fn engine_token(&self) -> &str {
        self.engine.as_deref().unwrap_or(AUTODETECT_ENGINE)
    }

    /// Per-command timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Retry policy from `--retries`, else from the environment
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.retries {
            Some(retries) => RetryPolicy::new(retries),
            None => RetryPolicy::from_env(),
        }
    }

    /// Validate flag values that clap cannot check alone
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.app_build == 0 {
            return Err("--app-build must be greater than zero".to_string());
        }
        if self.timeout == 0 {
            return Err("--timeout must be greater than zero".to_string());
        }
        if let Some(retries) = self.retries
            && retries > MAX_BUILD_RETRIES
        {
            return Err(format!(
                "--retries too high: {} (max: {})",
                retries, MAX_BUILD_RETRIES
            ));
        }
        if Path::new(&self.package).is_absolute() {
            return Err(format!(
                "package {} must be relative to the work dir",
                self.package
            ));
        }
        Ok(())
    }

    /// Assemble the shared build context
    pub fn build_context(&self) -> Result<BuildContext> {
        let workdir = match &self.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let cache = match &self.cache {
            Some(dir) => dir.clone(),
            None => default_cache_dir(&workdir),
        };
        let volume = Volume::new(&workdir, &cache)?;

        let name = match &self.name {
            Some(name) => name.clone(),
            None => default_name(volume.work_dir_host(), &self.package)?,
        };

        let limits = match &self.docker_memory {
            Some(memory) => ContainerLimits::from_cli(
                memory,
                self.docker_memory_swap.as_deref(),
                self.docker_cpus.as_deref(),
                self.docker_pids_limit,
            )
            .map_err(|reason| CliError::InvalidArguments { reason })?,
            None => ContainerLimits::default(),
        };

        let context = BuildContext::new(name, volume)?
            .with_app_id(self.app_id.clone())
            .with_version(self.app_version.clone(), self.app_build)
            .with_release(self.release)
            .with_icon(&self.icon)
            .with_package(self.package.clone())
            .with_env(parse_env_overrides(&self.env)?)
            .with_pull(self.pull)
            .with_limits(limits);
        Ok(context)
    }
}

/// `<user cache>/fyne-cross`, or a hidden dir in the work dir without one
fn default_cache_dir(workdir: &Path) -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("fyne-cross"))
        .unwrap_or_else(|| workdir.join(".fyne-cross-cache"))
}

/// Last component of `<work dir>/<package>`
fn default_name(work_dir: &Path, package: &str) -> Result<String> {
    let dir = if package == "." {
        work_dir.to_path_buf()
    } else {
        work_dir.join(package)
    };
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CliError::InvalidArguments {
                reason: format!(
                    "cannot derive an application name from {}; pass --name",
                    dir.display()
                ),
            }
            .into()
        })
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    json: bool,
}

impl RuntimeConfig {
    /// Runtime configuration with the given output modes
    pub fn new(verbose: bool, quiet: bool, json: bool) -> Self {
        Self {
            // JSON goes to stdout alone, so human output is silenced
            output: super::OutputManager::new(verbose, quiet || json),
            json,
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Whether the summary is printed as JSON
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Whether container output is echoed
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet, args.json)
    }
}
