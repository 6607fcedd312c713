//! Per-architecture container images and how commands run inside them.
//!
//! # Module Structure
//!
//! - `arch` - Target CPU architectures
//! - `factory` - Image references and toolchain environment per architecture
//! - `limits` - Resource limits for local containers
//! - `session` - One image's containers across the build phases
//! - `volume` - Host/container directory layout

mod arch;
mod factory;
mod limits;
mod session;
mod volume;

pub use arch::Architecture;
pub use factory::{
    ENV_CC, ENV_CGO_LDFLAGS, ENV_CXX, ENV_GOARCH, ENV_GOOS, FREEBSD_IMAGE_AMD64,
    FREEBSD_IMAGE_ARM64, FREEBSD_OS, ImageFactory, LLD_LINKER_FLAG, default_image, needs_lld,
};
pub use limits::ContainerLimits;
pub use session::{CLEANUP_TIMEOUT, POD_READY_TIMEOUT, Session};
pub use volume::{CONTAINER_CACHE_DIR, CONTAINER_WORK_DIR, Volume, join_path_container};

use crate::context::BuildContext;
use crate::engine::{Engine, EngineKind};
use crate::error::ProcessError;
use crate::process::{CommandRequest, CommandRunner};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Cluster client binary
const KUBECTL: &str = "kubectl";

/// Per-invocation options for [`Session::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Container working directory; defaults to the container work dir
    pub workdir: Option<String>,
}

impl RunOptions {
    /// Run in `workdir` inside the container
    pub fn in_dir(workdir: impl Into<String>) -> Self {
        Self {
            workdir: Some(workdir.into()),
        }
    }
}

/// Build descriptor for one target OS/architecture pair.
///
/// The environment is owned by the image and fixed once the factory returns
/// it, so images can be built concurrently without sharing mutable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    os: String,
    arch: Architecture,
    reference: String,
    env: BTreeMap<String, String>,
    id: String,
    engine: Engine,
}

impl ContainerImage {
    /// Target OS tag, e.g. `"freebsd"`
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Target architecture
    pub fn arch(&self) -> Architecture {
        self.arch
    }

    /// Image reference passed to the engine
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Environment set inside the container
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Value of one environment variable
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Identity token `"<os>-<arch>"`, used to namespace tmp and bin dirs
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine that runs this image
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Open a session for running this image's build phases
    pub async fn start<'a, R: CommandRunner>(
        &'a self,
        runner: &'a R,
        ctx: &'a BuildContext,
    ) -> Result<Session<'a, R>, ProcessError> {
        Session::open(self, runner, ctx).await
    }

    /// Unique container or pod name for one invocation
    pub fn container_name(&self) -> String {
        format!("kodegen-cross-{}-{}", self.id, Uuid::new_v4().simple())
    }

    /// Command line that runs `cmd` in the container called `name`.
    ///
    /// Local engines start a fresh container with that name and the host
    /// mounts. Kubernetes execs into the already running pod `name`.
    pub fn command(
        &self,
        ctx: &BuildContext,
        name: &str,
        opts: &RunOptions,
        cmd: &[String],
    ) -> CommandRequest {
        let workdir = opts
            .workdir
            .clone()
            .unwrap_or_else(|| ctx.volume().work_dir_container());

        match self.engine.kind() {
            EngineKind::Docker | EngineKind::Podman => {
                self.local_command(ctx, name, &workdir, cmd)
            }
            EngineKind::Kubernetes => exec_command(name, &workdir, cmd),
        }
    }

    /// Start a pod called `name` that idles until deleted.
    ///
    /// The image environment is set on the pod so every `exec` inherits it.
    pub fn pod_command(&self, ctx: &BuildContext, name: &str) -> CommandRequest {
        let mut args = vec![
            "run".to_string(),
            name.to_string(),
            format!("--image={}", self.reference),
            "--restart=Never".to_string(),
        ];
        for (key, value) in self.container_env(ctx) {
            args.push(format!("--env={}={}", key, value));
        }
        args.extend(["--command", "--", "tail", "-f", "/dev/null"].map(String::from));
        CommandRequest::new(KUBECTL).args(args)
    }

    /// Force removal of the container or pod called `name`
    pub fn removal_command(&self, name: &str) -> CommandRequest {
        if self.engine.is_kubernetes() {
            CommandRequest::new(KUBECTL).args([
                "delete",
                "pod",
                name,
                "--ignore-not-found",
                "--wait=false",
            ])
        } else {
            CommandRequest::new(self.engine.binary()).args(["rm", "-f", name])
        }
    }

    /// `pull` command for local engines; the cluster pulls on its own
    pub fn pull_command(&self) -> Option<CommandRequest> {
        if self.engine.is_kubernetes() {
            return None;
        }
        Some(
            CommandRequest::new(self.engine.binary())
                .args(["pull", self.reference.as_str()]),
        )
    }

    fn container_env(&self, ctx: &BuildContext) -> Vec<(String, String)> {
        let mut env = vec![
            ("CGO_ENABLED".to_string(), "1".to_string()),
            (
                "GOCACHE".to_string(),
                join_path_container(&ctx.volume().cache_dir_container(), &["go-build"]),
            ),
        ];
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    fn local_command(
        &self,
        ctx: &BuildContext,
        name: &str,
        workdir: &str,
        cmd: &[String],
    ) -> CommandRequest {
        let volume = ctx.volume();
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name.to_string(),
            "-w".to_string(),
            workdir.to_string(),
            "-v".to_string(),
            format!(
                "{}:{}",
                volume.work_dir_host().display(),
                volume.work_dir_container()
            ),
            "-v".to_string(),
            format!(
                "{}:{}",
                volume.cache_dir_host().display(),
                volume.cache_dir_container()
            ),
        ];
        args.extend(ctx.limits().to_args());

        if self.engine.is_docker() {
            // Files written to the bind mount must belong to the invoking user
            #[cfg(unix)]
            {
                args.push("--user".to_string());
                args.push(format!(
                    "{}:{}",
                    users::get_current_uid(),
                    users::get_current_gid()
                ));
                args.push("-e".to_string());
                args.push("HOME=/tmp".to_string());
            }
        } else {
            args.push("--userns".to_string());
            args.push("keep-id".to_string());
        }

        for (key, value) in self.container_env(ctx) {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(self.reference.clone());
        args.extend(cmd.iter().cloned());

        CommandRequest::new(self.engine.binary()).args(args)
    }
}

/// `kubectl exec` of `cmd` in `workdir` inside pod `name`
fn exec_command(name: &str, workdir: &str, cmd: &[String]) -> CommandRequest {
    let script = format!(
        "cd {} && {}",
        shell_quote(workdir),
        cmd.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
    );
    CommandRequest::new(KUBECTL).args(["exec", name, "--", "sh", "-c", script.as_str()])
}

/// Quote `arg` for `sh -c` unless it is made only of safe characters
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn context() -> BuildContext {
        let volume = Volume::new(Path::new("/home/dev/app"), Path::new("/home/dev/cache")).unwrap();
        BuildContext::new("calc", volume)
            .unwrap()
            .with_limits(ContainerLimits::from_cli("4g", Some("6g"), Some("2"), 1000).unwrap())
    }

    fn image(engine: Engine) -> ContainerImage {
        ImageFactory::new(engine, Architecture::Amd64, BTreeMap::new())
            .create_image(Architecture::Amd64, FREEBSD_OS, None)
            .unwrap()
    }

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_docker_command_layout() {
        let engine = Engine::local(EngineKind::Docker, PathBuf::from("/usr/bin/docker"));
        let image = image(engine);
        let name = image.container_name();
        let request = image.command(&context(), &name, &RunOptions::default(), &cmd(&["ls", "-la"]));

        assert_eq!(request.program, PathBuf::from("/usr/bin/docker"));
        let args = &request.args;
        assert_eq!(&args[..2], &["run", "--rm"]);
        assert!(name.starts_with("kodegen-cross-freebsd-amd64-"));
        assert_eq!(args[3], name);
        assert_eq!(&args[4..6], &["-w", "/app"]);
        assert!(args.contains(&"/home/dev/app:/app".to_string()));
        assert!(args.contains(&"/home/dev/cache:/go".to_string()));
        assert!(args.contains(&"--pids-limit".to_string()));
        assert!(args.contains(&"GOOS=freebsd".to_string()));
        assert!(args.contains(&"GOCACHE=/go/go-build".to_string()));
        assert!(!args.contains(&"keep-id".to_string()));

        let n = args.len();
        assert_eq!(&args[n - 3..], &[FREEBSD_IMAGE_AMD64, "ls", "-la"]);
    }

    #[test]
    fn test_podman_keeps_user_namespace() {
        let engine = Engine::local(EngineKind::Podman, PathBuf::from("/usr/bin/podman"));
        let image = image(engine);
        let request = image.command(
            &context(),
            "build",
            &RunOptions::in_dir("/app/src"),
            &cmd(&["true"]),
        );

        assert!(request.args.windows(2).any(|w| w == ["--userns", "keep-id"]));
        assert!(request.args.windows(2).any(|w| w == ["-w", "/app/src"]));
        assert!(request.args.windows(2).any(|w| w == ["-e", "CGO_ENABLED=1"]));
        assert!(request.args.windows(2).any(|w| w == ["-e", "GOCACHE=/go/go-build"]));
        assert!(!request.args.contains(&"--user".to_string()));
    }

    #[test]
    fn test_local_removal_command() {
        let engine = Engine::local(EngineKind::Podman, PathBuf::from("/usr/bin/podman"));
        let request = image(engine).removal_command("build");
        assert_eq!(request.program, PathBuf::from("/usr/bin/podman"));
        assert_eq!(request.args, vec!["rm", "-f", "build"]);
    }

    #[test]
    fn test_kubernetes_execs_into_pod() {
        let image = image(Engine::kubernetes());
        let request = image.command(
            &context(),
            "pod-1",
            &RunOptions::in_dir("/app/fyne-cross/bin/freebsd-amd64"),
            &cmd(&["tar", "-xf", "pkg name.tar.xz"]),
        );

        assert_eq!(request.program, PathBuf::from("kubectl"));
        assert_eq!(&request.args[..5], &["exec", "pod-1", "--", "sh", "-c"]);
        assert_eq!(
            request.args.last().unwrap(),
            "cd /app/fyne-cross/bin/freebsd-amd64 && tar -xf 'pkg name.tar.xz'"
        );
        assert!(image.pull_command().is_none());
    }

    #[test]
    fn test_kubernetes_pod_carries_environment() {
        let image = image(Engine::kubernetes());
        let request = image.pod_command(&context(), "pod-1");

        assert_eq!(&request.args[..2], &["run", "pod-1"]);
        assert!(request.args.contains(&format!("--image={}", FREEBSD_IMAGE_AMD64)));
        assert!(request.args.contains(&"--restart=Never".to_string()));
        assert!(request.args.contains(&"--env=GOARCH=amd64".to_string()));
        assert!(request.args.contains(&"--env=CGO_ENABLED=1".to_string()));
        assert!(request.args.contains(&"--env=GOCACHE=/go/go-build".to_string()));
        assert!(request.args.ends_with(&cmd(&["--command", "--", "tail", "-f", "/dev/null"])));

        let removal = image.removal_command("pod-1");
        assert_eq!(removal.program, PathBuf::from("kubectl"));
        assert_eq!(&removal.args[..3], &["delete", "pod", "pod-1"]);
    }

    #[test]
    fn test_pull_command() {
        let engine = Engine::local(EngineKind::Docker, PathBuf::from("/usr/bin/docker"));
        let request = image(engine).pull_command().unwrap();
        assert_eq!(request.args, vec!["pull", FREEBSD_IMAGE_AMD64]);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("usr/local/bin"), "usr/local/bin");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
