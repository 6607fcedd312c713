//! Subprocess execution for engine checks and container commands.
//!
//! Everything that touches the host goes through [`CommandRunner`] and
//! [`ExecutableLookup`] so engine resolution and the build phases can be
//! exercised against recorded responses.

use crate::cli::OutputManager;
use crate::error::ProcessError;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Timeout for a single container command (20 minutes)
/// Packaging runs a full Go build which can be slow on first use of the cache
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1200);

/// A command line to execute on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Executable name or path
    pub program: PathBuf,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Host working directory for the process
    pub workdir: Option<PathBuf>,
}

impl CommandRequest {
    /// Start a request for `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the host working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Command line as a single string, for logs and error messages
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// Runs a command to completion and captures its output.
///
/// A non-zero exit is reported as [`ProcessError::Failed`] and an elapsed
/// timeout as [`ProcessError::TimedOut`].
pub trait CommandRunner: Send + Sync {
    /// Run `request` and wait for it to exit
    fn run(
        &self,
        request: &CommandRequest,
    ) -> impl Future<Output = Result<CommandOutput, ProcessError>> + Send;
}

/// Resolves executable names against the host search path
pub trait ExecutableLookup: Send + Sync {
    /// Full path of `name`, or `None` when it is not installed
    fn lookup(&self, name: &str) -> Option<PathBuf>;
}

/// [`ExecutableLookup`] backed by the `which` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct WhichLookup;

impl ExecutableLookup for WhichLookup {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        match which::which(name) {
            Ok(path) => {
                log::debug!("Found {} at: {}", name, path.display());
                Some(path)
            }
            Err(e) => {
                log::debug!("{} not found in PATH: {}", name, e);
                None
            }
        }
    }
}

/// [`CommandRunner`] that spawns real processes with tokio
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
    output: Option<OutputManager>,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SystemRunner {
    /// Runner that kills commands after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            output: None,
        }
    }

    /// Echo each stdout line through `output` while capturing it
    pub fn with_output(mut self, output: OutputManager) -> Self {
        self.output = Some(output);
        self
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, ProcessError> {
        let command_line = request.display();
        log::debug!("Running: {}", command_line);

        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.workdir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let echo = self.output.as_ref();

        // Both streams must be drained before waiting or a full pipe blocks the child
        let completion = async {
            let (stdout, stderr) = tokio::join!(drain(stdout, echo), drain(stderr, None));
            let status = child.wait().await;
            (stdout, stderr, status)
        };

        let finished = tokio::time::timeout(self.timeout, completion).await;
        let (stdout, stderr, status) = match finished {
            Ok(finished) => finished,
            Err(_elapsed) => {
                log::warn!(
                    "`{}` timed out after {} seconds, terminating...",
                    command_line,
                    self.timeout.as_secs()
                );
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill `{}`: {}", command_line, e);
                }
                return Err(ProcessError::TimedOut {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
        };

        let status = status.map_err(|e| ProcessError::Spawn {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            log::debug!("`{}` failed with {:?}", command_line, status.code());
            return Err(ProcessError::Failed {
                command: command_line,
                code: status.code(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Read `stream` to EOF, line by line, echoing each line through `echo`.
///
/// Bytes that are not UTF-8 are replaced rather than ending the read, so the
/// child never sees a closed pipe.
async fn drain<S>(stream: Option<S>, echo: Option<&OutputManager>) -> String
where
    S: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(stream) = stream else {
        return captured;
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if let Some(output) = echo {
                    let _ = output.indent(line);
                }
                captured.push_str(line);
                captured.push('\n');
            }
            Err(e) => {
                log::debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
    captured
}
