//! Container lifetime for one image across its build phases.
//!
//! Local engines run every command in a fresh `run --rm` container that sees
//! the host work dir through the bind mount. A command that fails or times
//! out leaves its container behind, so the container is force-removed.
//!
//! Kubernetes has no host mounts. The session starts one idle pod, copies the
//! host work dir into it, execs every command there, copies the image's tmp
//! and bin dirs back when the build succeeded, and always deletes the pod.

use super::{ContainerImage, RunOptions, join_path_container};
use crate::context::BuildContext;
use crate::error::ProcessError;
use crate::process::{CommandOutput, CommandRequest, CommandRunner};
use std::path::Path;
use tokio::time::Duration;

/// Longest wait for a container or pod removal
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest wait for a build pod to become ready
pub const POD_READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs one image's commands and cleans up after them
pub struct Session<'a, R> {
    image: &'a ContainerImage,
    runner: &'a R,
    ctx: &'a BuildContext,
    pod: Option<String>,
}

impl<'a, R: CommandRunner> Session<'a, R> {
    /// Open a session; for Kubernetes this starts and stocks the pod
    pub(crate) async fn open(
        image: &'a ContainerImage,
        runner: &'a R,
        ctx: &'a BuildContext,
    ) -> Result<Self, ProcessError> {
        if !image.engine().is_kubernetes() {
            return Ok(Self {
                image,
                runner,
                ctx,
                pod: None,
            });
        }

        let pod = image.container_name();
        let session = Self {
            image,
            runner,
            ctx,
            pod: Some(pod.clone()),
        };

        log::info!("[{}] Starting pod {}", image.id(), pod);
        let started = async {
            runner.run(&image.pod_command(ctx, &pod)).await?;
            runner
                .run(&kubectl(vec![
                    "wait".to_string(),
                    "--for=condition=Ready".to_string(),
                    format!("pod/{}", pod),
                    format!("--timeout={}s", POD_READY_TIMEOUT.as_secs()),
                ]))
                .await?;
            runner
                .run(&kubectl(vec![
                    "cp".to_string(),
                    ctx.volume().work_dir_host().display().to_string(),
                    format!("{}:{}", pod, ctx.volume().work_dir_container()),
                ]))
                .await
        }
        .await;

        if let Err(e) = started {
            session.remove(&pod).await;
            return Err(e);
        }
        Ok(session)
    }

    /// Run `cmd` and wait for it
    pub async fn run(
        &self,
        opts: &RunOptions,
        cmd: &[String],
    ) -> Result<CommandOutput, ProcessError> {
        let name = match &self.pod {
            Some(pod) => pod.clone(),
            None => self.image.container_name(),
        };
        let request = self.image.command(self.ctx, &name, opts, cmd);
        log::debug!("[{}] {}", self.image.id(), request.display());

        let result = self.runner.run(&request).await;
        // The pod outlives the command and is deleted by `finish`
        if result.is_err() && self.pod.is_none() {
            self.remove(&name).await;
        }
        result
    }

    /// End the session.
    ///
    /// With `copy_back`, a pod's tmp and bin dirs for this image are copied
    /// to the host first. The pod is deleted whatever happens.
    pub async fn finish(self, copy_back: bool) -> Result<(), ProcessError> {
        let Some(pod) = &self.pod else {
            return Ok(());
        };

        let mut copied = Ok(());
        if copy_back {
            let volume = self.ctx.volume();
            let id = self.image.id();
            for (container_dir, host_dir) in [
                (volume.tmp_dir_container(), volume.tmp_dir_host()),
                (volume.bin_dir_container(), volume.bin_dir_host()),
            ] {
                copied = self
                    .copy_from_pod(pod, &join_path_container(&container_dir, &[id]), &host_dir.join(id))
                    .await;
                if copied.is_err() {
                    break;
                }
            }
        }

        self.remove(pod).await;
        copied
    }

    async fn copy_from_pod(
        &self,
        pod: &str,
        container_dir: &str,
        host_dir: &Path,
    ) -> Result<(), ProcessError> {
        self.runner
            .run(&kubectl(vec![
                "cp".to_string(),
                format!("{}:{}", pod, container_dir),
                host_dir.display().to_string(),
            ]))
            .await
            .map(|_| ())
    }

    /// Best-effort forced removal, bounded by [`CLEANUP_TIMEOUT`]
    async fn remove(&self, name: &str) {
        let request = self.image.removal_command(name);
        match tokio::time::timeout(CLEANUP_TIMEOUT, self.runner.run(&request)).await {
            Ok(Ok(_)) => log::debug!("[{}] Removed {}", self.image.id(), name),
            Ok(Err(e)) => log::debug!("[{}] Could not remove {}: {}", self.image.id(), name, e),
            Err(_) => log::warn!(
                "[{}] Timed out removing {} after {} seconds",
                self.image.id(),
                name,
                CLEANUP_TIMEOUT.as_secs()
            ),
        }
    }
}

fn kubectl(args: Vec<String>) -> CommandRequest {
    CommandRequest::new(super::KUBECTL).args(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Architecture, FREEBSD_OS, ImageFactory, Volume};
    use crate::engine::{Engine, EngineKind};
    use crate::process::testing::MockRunner;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn context() -> BuildContext {
        let volume = Volume::new(Path::new("/home/dev/app"), Path::new("/home/dev/cache")).unwrap();
        BuildContext::new("calc", volume).unwrap()
    }

    fn image(engine: Engine) -> ContainerImage {
        ImageFactory::new(engine, Architecture::Amd64, BTreeMap::new())
            .create_image(Architecture::Amd64, FREEBSD_OS, None)
            .unwrap()
    }

    fn docker() -> Engine {
        Engine::local(EngineKind::Docker, PathBuf::from("/usr/bin/docker"))
    }

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    fn timed_out() -> ProcessError {
        ProcessError::TimedOut {
            command: "docker run".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    /// Value following `flag` in `args`
    fn flag_value<'a>(args: &'a [String], flag: &str) -> &'a str {
        let at = args.iter().position(|a| a == flag).unwrap();
        &args[at + 1]
    }

    #[tokio::test]
    async fn test_timed_out_container_is_force_removed() {
        let ctx = context();
        let image = image(docker());
        let runner = MockRunner::new();
        runner.push(Err(timed_out()));

        let session = image.start(&runner, &ctx).await.unwrap();
        let err = session.run(&RunOptions::default(), &cmd(&["fyne", "package"])).await;
        assert!(matches!(err, Err(ProcessError::TimedOut { .. })));

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        let name = flag_value(&calls[0].args, "--name");
        assert_eq!(calls[1].program, PathBuf::from("/usr/bin/docker"));
        assert_eq!(calls[1].args, vec!["rm", "-f", name]);
    }

    #[tokio::test]
    async fn test_successful_local_run_leaves_nothing_to_remove() {
        let ctx = context();
        let image = image(docker());
        let runner = MockRunner::new();

        let session = image.start(&runner, &ctx).await.unwrap();
        session.run(&RunOptions::default(), &cmd(&["true"])).await.unwrap();
        session.finish(true).await.unwrap();
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_pod_lifecycle() {
        let ctx = context();
        let image = image(Engine::kubernetes());
        let runner = MockRunner::new();

        let session = image.start(&runner, &ctx).await.unwrap();
        session
            .run(&RunOptions::in_dir("/app/fyne-cross/bin/freebsd-amd64"), &cmd(&["tar", "-xf", "pkg"]))
            .await
            .unwrap();
        session.finish(true).await.unwrap();

        let calls = runner.calls();
        let pod = calls[0].args[1].clone();
        assert!(pod.starts_with("kodegen-cross-freebsd-amd64-"));
        assert!(calls.iter().all(|c| c.program == PathBuf::from("kubectl")));

        assert!(calls[0].args.contains(&"--env=GOOS=freebsd".to_string()));
        assert_eq!(calls[1].args[..3], ["wait", "--for=condition=Ready", format!("pod/{}", pod).as_str()]);
        assert_eq!(calls[2].args, vec!["cp".to_string(), "/home/dev/app".to_string(), format!("{}:/app", pod)]);
        assert_eq!(calls[3].args[..3], ["exec", pod.as_str(), "--"]);
        assert_eq!(
            calls[3].args.last().unwrap(),
            "cd /app/fyne-cross/bin/freebsd-amd64 && tar -xf pkg"
        );
        assert_eq!(
            calls[4].args,
            vec![
                "cp".to_string(),
                format!("{}:/app/fyne-cross/tmp/freebsd-amd64", pod),
                "/home/dev/app/fyne-cross/tmp/freebsd-amd64".to_string(),
            ]
        );
        assert_eq!(calls[5].args[1], format!("{}:/app/fyne-cross/bin/freebsd-amd64", pod));
        assert_eq!(calls[6].args[..3], ["delete", "pod", pod.as_str()]);
        assert_eq!(calls.len(), 7);
    }

    #[tokio::test]
    async fn test_failed_pod_start_deletes_pod() {
        let ctx = context();
        let image = image(Engine::kubernetes());
        let runner = MockRunner::new();
        runner.push_stdout("");
        runner.push(Err(timed_out()));

        assert!(image.start(&runner, &ctx).await.is_err());
        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].args[..2], ["delete", "pod"]);
    }

    #[tokio::test]
    async fn test_failed_build_deletes_pod_without_copying() {
        let ctx = context();
        let image = image(Engine::kubernetes());
        let runner = MockRunner::new();

        let session = image.start(&runner, &ctx).await.unwrap();
        session.finish(false).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[3].args[..2], ["delete", "pod"]);
    }
}
