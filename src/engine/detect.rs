//! Engine autodetection.
//!
//! Only the fixed Docker path is checked. Distributions that ship a
//! `podman-docker` shim install it at the same path, so the lowercased
//! `--version` text tells the two apart with a single subprocess call.
//!
//! Known limitation: engines installed elsewhere, or a version string that is
//! localized or names neither runtime, fail detection. Pass `--engine`
//! explicitly in those cases.

use super::{DOCKER_ENGINE, Engine, EngineKind, PODMAN_ENGINE};
use crate::error::{EngineError, ProcessError};
use crate::process::{CommandRequest, CommandRunner};
use std::path::PathBuf;

/// Binary checked during autodetection
pub(crate) const DOCKER_FIXED_PATH: &str = "/usr/bin/docker";

pub(super) async fn autodetect<R: CommandRunner>(runner: &R) -> Result<Engine, EngineError> {
    let check = CommandRequest::new(DOCKER_FIXED_PATH).arg("--version");

    let output = match runner.run(&check).await {
        Ok(output) => output.stdout,
        Err(ProcessError::Failed { stdout, stderr, .. }) => {
            return Err(EngineError::DetectionFailed {
                output: if stdout.is_empty() { stderr } else { stdout },
            });
        }
        Err(e) => {
            return Err(EngineError::DetectionFailed {
                output: e.to_string(),
            });
        }
    };

    let kind = classify_version_output(&output).ok_or_else(|| EngineError::DetectionFailed {
        output: output.clone(),
    })?;
    log::debug!("Autodetected {} from: {}", kind.token(), output.trim());

    Ok(Engine::local(kind, PathBuf::from(DOCKER_FIXED_PATH)))
}

/// Docker wins when both names appear
fn classify_version_output(output: &str) -> Option<EngineKind> {
    let lowered = output.to_lowercase();
    if lowered.contains(DOCKER_ENGINE) {
        Some(EngineKind::Docker)
    } else if lowered.contains(PODMAN_ENGINE) {
        Some(EngineKind::Podman)
    } else {
        None
    }
}
