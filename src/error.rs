//! Error types for cross-compilation runs.
//!
//! Engine errors are fatal to the whole run. Build errors are fatal only to
//! the image they name, so the driver can keep building sibling architectures.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for kodegen_bundler_cross operations
pub type Result<T> = std::result::Result<T, CrossError>;

/// Main error type for all kodegen_bundler_cross operations
#[derive(Error, Debug)]
pub enum CrossError {
    /// Container engine selection errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Per-image build errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Subprocess errors outside of a build phase
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Container engine resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Requested engine binary is not on PATH
    #[error("{name} binary not found in PATH")]
    NotFound {
        /// Engine token that was requested
        name: String,
    },

    /// Autodetection could not classify the checked binary
    #[error("could not detect engine version: {output}")]
    DetectionFailed {
        /// Raw output of the version check
        output: String,
    },

    /// Cluster backend could not be reached
    #[error("kubernetes cluster unreachable: {cause}")]
    ClusterUnreachable {
        /// Why the cluster check failed
        cause: String,
    },

    /// Engine token is not one of the recognized values
    #[error("unsupported container engine: {name:?}")]
    Unsupported {
        /// The rejected token
        name: String,
    },
}

/// Build phase of a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Icon and resource staging
    Prepare,
    /// In-container packaging
    Package,
    /// Moving the package into the per-image tmp dir
    Relocate,
    /// Extracting the binary into the per-image bin dir
    Extract,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Package => write!(f, "package"),
            Self::Relocate => write!(f, "relocate"),
            Self::Extract => write!(f, "extract"),
        }
    }
}

/// Errors raised while building one image
#[derive(Error, Debug)]
pub enum BuildError {
    /// Packaging command failed inside the container
    #[error("[{image_id}] could not package the Fyne app: {source}")]
    PackagingFailed {
        /// Identity token of the failing image
        image_id: String,
        /// Underlying command failure
        #[source]
        source: ProcessError,
    },

    /// Moving the package into the tmp dir failed
    #[error("[{image_id}] could not relocate the package: {source}")]
    RelocateFailed {
        /// Identity token of the failing image
        image_id: String,
        /// Underlying command failure
        #[source]
        source: ProcessError,
    },

    /// Extracting the binary from the package failed
    #[error("[{image_id}] could not extract the executable: {source}")]
    ExtractFailed {
        /// Identity token of the failing image
        image_id: String,
        /// Underlying command failure
        #[source]
        source: ProcessError,
    },

    /// The phase was aborted by the runner timeout
    #[error("[{image_id}] {phase} phase was cancelled")]
    Cancelled {
        /// Identity token of the cancelled image
        image_id: String,
        /// Phase that was running
        phase: Phase,
    },
}

impl BuildError {
    /// Attribute a runner failure to a phase of one image.
    ///
    /// Timeouts become [`BuildError::Cancelled`] whatever the phase.
    pub fn from_phase(phase: Phase, image_id: &str, source: ProcessError) -> Self {
        let image_id = image_id.to_string();
        if matches!(source, ProcessError::TimedOut { .. }) {
            return Self::Cancelled { image_id, phase };
        }
        match phase {
            Phase::Package | Phase::Prepare => Self::PackagingFailed { image_id, source },
            Phase::Relocate => Self::RelocateFailed { image_id, source },
            Phase::Extract => Self::ExtractFailed { image_id, source },
        }
    }

    /// Identity token of the image this error belongs to
    pub fn image_id(&self) -> &str {
        match self {
            Self::PackagingFailed { image_id, .. }
            | Self::RelocateFailed { image_id, .. }
            | Self::ExtractFailed { image_id, .. }
            | Self::Cancelled { image_id, .. } => image_id,
        }
    }
}

/// Subprocess execution errors
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    /// The process could not be started
    #[error("failed to spawn `{command}`: {reason}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// OS error text
        reason: String,
    },

    /// The process ran and exited unsuccessfully
    #[error("`{command}` exited with code {code:?}: {stderr}")]
    Failed {
        /// Command line that failed
        command: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
    },

    /// The process exceeded the runner timeout and was killed
    #[error("`{command}` timed out after {} seconds", .timeout.as_secs())]
    TimedOut {
        /// Command line that timed out
        command: String,
        /// Timeout that elapsed
        timeout: Duration,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl CrossError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            CrossError::Engine(EngineError::NotFound { name }) => vec![
                format!("Install {} or make sure it is on PATH", name),
                "Omit --engine to autodetect the container engine".to_string(),
            ],
            CrossError::Engine(EngineError::DetectionFailed { .. }) => vec![
                "Autodetection only checks /usr/bin/docker".to_string(),
                "Pass --engine docker or --engine podman explicitly".to_string(),
            ],
            CrossError::Engine(EngineError::ClusterUnreachable { .. }) => vec![
                "Check that KUBECONFIG or ~/.kube/config points at a live cluster".to_string(),
                "Verify access with: kubectl cluster-info".to_string(),
            ],
            CrossError::Engine(EngineError::Unsupported { .. }) => {
                vec!["Supported engines: docker, podman, kubernetes".to_string()]
            }
            CrossError::Build(BuildError::Cancelled { .. }) => vec![
                "Increase the command timeout with --timeout".to_string(),
                "Check available system memory/CPU".to_string(),
            ],
            CrossError::Build(_) => vec![
                "Inspect the container output above for the failing command".to_string(),
                "Re-run with RUST_LOG=debug to see the full container command line".to_string(),
            ],
            CrossError::Cli(CliError::InvalidArguments { .. }) => {
                vec!["Run with --help to see usage".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable by re-running the build
    pub fn is_recoverable(&self) -> bool {
        match self {
            CrossError::Engine(_) | CrossError::Cli(_) => false,
            CrossError::Build(_) | CrossError::Process(_) | CrossError::Io(_) => true,
            CrossError::Json(_) => false,
        }
    }
}
