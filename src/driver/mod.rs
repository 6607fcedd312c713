//! Runs a platform's images concurrently and collects per-architecture
//! results.
//!
//! Every image gets its own tokio task. Before each attempt the image's
//! output directories are recreated, the image is pulled when requested, and
//! [`PlatformBuilder::build`] runs its phases. A failure is reported for that
//! image only; the other images keep going.

mod retry;

pub use retry::{MAX_BUILD_RETRIES, RETRY_ENV_VAR, RetryPolicy};

use crate::container::{Architecture, ContainerImage};
use crate::error::{CrossError, Result};
use crate::platform::PlatformBuilder;
use crate::process::CommandRunner;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Outcome of one image
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BuildReport {
    /// Identity token, e.g. `freebsd-arm64`
    pub id: String,
    /// Target architecture
    pub arch: Architecture,
    /// Artifact file name on success
    pub artifact: Option<String>,
    /// Host directory holding the extracted executable
    pub bin_dir: PathBuf,
    /// Last error on failure
    pub error: Option<String>,
    /// Attempts made, including the first
    pub attempts: u32,
}

impl BuildReport {
    /// Whether this image produced its artifact
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole run, in image order
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    /// One report per image
    pub reports: Vec<BuildReport>,
}

impl RunSummary {
    /// Reports that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = &BuildReport> {
        self.reports.iter().filter(|r| r.succeeded())
    }

    /// Reports that failed
    pub fn failed(&self) -> impl Iterator<Item = &BuildReport> {
        self.reports.iter().filter(|r| !r.succeeded())
    }

    /// `0` when every image succeeded, `1` otherwise
    pub fn exit_code(&self) -> i32 {
        if self.failed().next().is_none() { 0 } else { 1 }
    }
}

/// Build every image of `builder` concurrently.
///
/// Reports come back in the order of [`PlatformBuilder::images`], whatever
/// order the tasks finish in.
pub async fn run<B: PlatformBuilder>(builder: Arc<B>, retry: RetryPolicy) -> RunSummary {
    let count = builder.images().len();
    let mut tasks = JoinSet::new();
    let mut slots = HashMap::with_capacity(count);

    for index in 0..count {
        let builder = Arc::clone(&builder);
        let handle = tasks.spawn(async move {
            let image = &builder.images()[index];
            build_with_retry(&*builder, image, retry).await
        });
        slots.insert(handle.id(), index);
    }

    let mut reports: Vec<Option<BuildReport>> = vec![None; count];
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, report)) => {
                if let Some(&index) = slots.get(&id) {
                    reports[index] = Some(report);
                }
            }
            Err(e) => {
                if let Some(&index) = slots.get(&e.id()) {
                    let image = &builder.images()[index];
                    log::error!("[{}] build task aborted: {}", image.id(), e);
                    reports[index] = Some(report_for(
                        image,
                        builder.context().volume().bin_dir_host().as_path(),
                        Err(format!("build task aborted: {}", e)),
                        1,
                    ));
                }
            }
        }
    }

    RunSummary {
        reports: reports.into_iter().flatten().collect(),
    }
}

async fn build_with_retry<B: PlatformBuilder>(
    builder: &B,
    image: &ContainerImage,
    retry: RetryPolicy,
) -> BuildReport {
    let bin_root = builder.context().volume().bin_dir_host();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match attempt(builder, image).await {
            Ok(artifact) => {
                log::info!("[{}] Built {}", image.id(), artifact);
                return report_for(image, &bin_root, Ok(artifact), attempts);
            }
            Err(e) => {
                let retries_used = attempts - 1;
                if !e.is_recoverable() || retries_used >= retry.build_retries {
                    log::error!("[{}] {}", image.id(), e);
                    return report_for(image, &bin_root, Err(e.to_string()), attempts);
                }

                let wait = retry.delay(attempts);
                log::warn!(
                    "[{}] attempt {}/{} failed: {}; retrying in {:.1}s",
                    image.id(),
                    attempts,
                    retry.build_retries + 1,
                    e,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

async fn attempt<B: PlatformBuilder>(builder: &B, image: &ContainerImage) -> Result<String> {
    let ctx = builder.context();
    let volume = ctx.volume();
    for root in [volume.tmp_dir_host(), volume.bin_dir_host()] {
        reset_dir(&root.join(image.id())).await?;
    }

    if ctx.pull()
        && let Some(pull) = image.pull_command()
    {
        log::info!("[{}] Pulling {}", image.id(), image.reference());
        builder.runner().run(&pull).await.map_err(CrossError::from)?;
    }

    builder.build(image).await
}

/// Remove `dir` if present and create it empty
async fn reset_dir(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir).await? {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

fn report_for(
    image: &ContainerImage,
    bin_root: &Path,
    outcome: std::result::Result<String, String>,
    attempts: u32,
) -> BuildReport {
    let (artifact, error) = match outcome {
        Ok(artifact) => (Some(artifact), None),
        Err(error) => (None, Some(error)),
    };
    BuildReport {
        id: image.id().to_string(),
        arch: image.arch(),
        artifact,
        bin_dir: bin_root.join(image.id()),
        error,
        attempts,
    }
}
