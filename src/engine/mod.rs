//! Container engine selection.
//!
//! An [`Engine`] is either a local container runtime (Docker or Podman) with a
//! resolved binary, or the Kubernetes backend which has no local binary.
//! [`resolve_engine`] is the only way to obtain one.

mod cluster;
mod detect;

use crate::error::EngineError;
use crate::process::{CommandRunner, ExecutableLookup};
use std::path::{Path, PathBuf};

/// Token that requests autodetection
pub const AUTODETECT_ENGINE: &str = "";
/// Token for the Docker runtime
pub const DOCKER_ENGINE: &str = "docker";
/// Token for the Podman runtime
pub const PODMAN_ENGINE: &str = "podman";
/// Token for the Kubernetes backend
pub const KUBERNETES_ENGINE: &str = "kubernetes";

/// Kind of container engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Docker CLI
    Docker,
    /// Podman CLI
    Podman,
    /// Pods scheduled through kubectl
    Kubernetes,
}

impl EngineKind {
    /// Token used on the command line for this engine
    pub fn token(self) -> &'static str {
        match self {
            Self::Docker => DOCKER_ENGINE,
            Self::Podman => PODMAN_ENGINE,
            Self::Kubernetes => KUBERNETES_ENGINE,
        }
    }
}

/// A resolved container engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    kind: EngineKind,
    binary: PathBuf,
}

impl Engine {
    /// Engine kind
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Engine token, e.g. `"docker"`
    pub fn name(&self) -> &'static str {
        self.kind.token()
    }

    /// Local binary path; empty for Kubernetes
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Whether this is the Docker runtime
    pub fn is_docker(&self) -> bool {
        self.kind == EngineKind::Docker
    }

    /// Whether this is the Podman runtime
    pub fn is_podman(&self) -> bool {
        self.kind == EngineKind::Podman
    }

    /// Whether this is the Kubernetes backend
    pub fn is_kubernetes(&self) -> bool {
        self.kind == EngineKind::Kubernetes
    }

    pub(crate) fn local(kind: EngineKind, binary: PathBuf) -> Self {
        debug_assert!(kind != EngineKind::Kubernetes);
        Self { kind, binary }
    }

    pub(crate) fn kubernetes() -> Self {
        Self {
            kind: EngineKind::Kubernetes,
            binary: PathBuf::new(),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the engine named by `requested`, or autodetect one when it is empty.
///
/// Explicit tokens never fall back to a different engine: the result either
/// has the requested kind or is an error.
pub async fn resolve_engine<R, L>(
    requested: &str,
    runner: &R,
    lookup: &L,
) -> Result<Engine, EngineError>
where
    R: CommandRunner,
    L: ExecutableLookup,
{
    let engine = match requested {
        DOCKER_ENGINE => local_engine(EngineKind::Docker, lookup)?,
        PODMAN_ENGINE => local_engine(EngineKind::Podman, lookup)?,
        KUBERNETES_ENGINE => {
            cluster::check_cluster(runner, lookup).await?;
            Engine::kubernetes()
        }
        AUTODETECT_ENGINE => detect::autodetect(runner).await?,
        other => {
            return Err(EngineError::Unsupported {
                name: other.to_string(),
            });
        }
    };

    log::info!(
        "Using container engine {} ({})",
        engine,
        if engine.binary.as_os_str().is_empty() {
            "no local binary".to_string()
        } else {
            engine.binary.display().to_string()
        }
    );
    Ok(engine)
}

fn local_engine<L: ExecutableLookup>(kind: EngineKind, lookup: &L) -> Result<Engine, EngineError> {
    let name = kind.token();
    lookup
        .lookup(name)
        .map(|binary| Engine::local(kind, binary))
        .ok_or_else(|| EngineError::NotFound {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::process::testing::{MockLookup, MockRunner};

    #[tokio::test]
    async fn test_explicit_docker_uses_path_lookup() {
        let runner = MockRunner::new();
        let lookup = MockLookup::default().with("docker", "/opt/bin/docker");

        let engine = resolve_engine("docker", &runner, &lookup).await.unwrap();
        assert!(engine.is_docker());
        assert_eq!(engine.binary(), Path::new("/opt/bin/docker"));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_podman_missing_is_not_found() {
        let runner = MockRunner::new();
        // docker is installed but podman was requested: no fallback
        let lookup = MockLookup::default().with("docker", "/usr/bin/docker");

        let err = resolve_engine("podman", &runner, &lookup).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::NotFound {
                name: "podman".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_explicit_tokens_resolve_to_requested_kind() {
        let lookup = MockLookup::default()
            .with("docker", "/usr/bin/docker")
            .with("podman", "/usr/bin/podman")
            .with("kubectl", "/usr/bin/kubectl");

        for token in [DOCKER_ENGINE, PODMAN_ENGINE] {
            let runner = MockRunner::new();
            let engine = resolve_engine(token, &runner, &lookup).await.unwrap();
            assert_eq!(engine.name(), token);
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_unsupported() {
        let runner = MockRunner::new();
        let lookup = MockLookup::default().with("docker", "/usr/bin/docker");

        let err = resolve_engine("bogus", &runner, &lookup).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::Unsupported {
                name: "bogus".to_string()
            }
        );
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tokens_are_case_sensitive() {
        let runner = MockRunner::new();
        let lookup = MockLookup::default().with("docker", "/usr/bin/docker");

        let err = resolve_engine("Docker", &runner, &lookup).await.unwrap_err();
        assert!(matches!(err, EngineError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_autodetect_docker() {
        let runner = MockRunner::new();
        runner.push_stdout("Docker version 24.0.5, build ced0996\n");

        let engine = resolve_engine("", &runner, &MockLookup::default())
            .await
            .unwrap();
        assert!(engine.is_docker());
        assert_eq!(engine.binary(), Path::new(detect::DOCKER_FIXED_PATH));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from(detect::DOCKER_FIXED_PATH));
        assert_eq!(calls[0].args, vec!["--version".to_string()]);
    }

    #[tokio::test]
    async fn test_autodetect_podman_shim() {
        let runner = MockRunner::new();
        runner.push_stdout("podman version 4.3.1\n");

        let engine = resolve_engine("", &runner, &MockLookup::default())
            .await
            .unwrap();
        assert!(engine.is_podman());
        assert_eq!(engine.binary(), Path::new(detect::DOCKER_FIXED_PATH));
    }

    #[tokio::test]
    async fn test_autodetect_unknown_output() {
        let runner = MockRunner::new();
        runner.push_stdout("nerdctl version 1.7.0\n");

        let err = resolve_engine("", &runner, &MockLookup::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::DetectionFailed {
                output: "nerdctl version 1.7.0\n".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_autodetect_version_check_failure() {
        let runner = MockRunner::new();
        runner.push(Err(ProcessError::Spawn {
            command: "/usr/bin/docker --version".to_string(),
            reason: "No such file or directory".to_string(),
        }));

        let err = resolve_engine("", &runner, &MockLookup::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DetectionFailed { .. }));
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn test_engine_display_and_queries() {
        let engine = Engine::kubernetes();
        assert_eq!(engine.to_string(), "kubernetes");
        assert!(engine.is_kubernetes());
        assert!(!engine.is_docker());
        assert!(engine.binary().as_os_str().is_empty());
    }
}
