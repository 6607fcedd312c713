//! Kubernetes reachability check.

use crate::error::EngineError;
use crate::process::{CommandRequest, CommandRunner, ExecutableLookup};
use std::path::PathBuf;

/// Per-request timeout handed to kubectl
const CLUSTER_REQUEST_TIMEOUT: &str = "--request-timeout=10s";

pub(super) async fn check_cluster<R, L>(runner: &R, lookup: &L) -> Result<(), EngineError>
where
    R: CommandRunner,
    L: ExecutableLookup,
{
    let in_cluster = std::env::var_os("KUBERNETES_SERVICE_HOST").is_some();
    check_cluster_with(kubeconfig_candidates(), in_cluster, runner, lookup).await
}

pub(super) async fn check_cluster_with<R, L>(
    kubeconfigs: Vec<PathBuf>,
    in_cluster: bool,
    runner: &R,
    lookup: &L,
) -> Result<(), EngineError>
where
    R: CommandRunner,
    L: ExecutableLookup,
{
    if !in_cluster && !kubeconfigs.iter().any(|path| path.is_file()) {
        return Err(EngineError::ClusterUnreachable {
            cause: format!(
                "no kubeconfig found (looked in: {})",
                display_paths(&kubeconfigs)
            ),
        });
    }

    let kubectl = lookup
        .lookup("kubectl")
        .ok_or_else(|| EngineError::ClusterUnreachable {
            cause: "kubectl binary not found in PATH".to_string(),
        })?;

    let check = CommandRequest::new(kubectl).args(["cluster-info", CLUSTER_REQUEST_TIMEOUT]);
    runner
        .run(&check)
        .await
        .map(|_| log::debug!("Kubernetes cluster is reachable"))
        .map_err(|e| EngineError::ClusterUnreachable {
            cause: e.to_string(),
        })
}

/// `$KUBECONFIG` entries, else `~/.kube/config`
fn kubeconfig_candidates() -> Vec<PathBuf> {
    if let Some(value) = std::env::var_os("KUBECONFIG")
        && !value.is_empty()
    {
        return std::env::split_paths(&value).collect();
    }
    dirs::home_dir()
        .map(|home| vec![home.join(".kube").join("config")])
        .unwrap_or_default()
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
