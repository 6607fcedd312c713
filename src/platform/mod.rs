//! Target platforms.
//!
//! Each target OS provides a [`PlatformBuilder`]: it owns the images built
//! for the requested architectures and knows how to turn one image into an
//! artifact. The shared [`driver`](crate::driver) runs the images.

mod freebsd;
mod fyne;

pub use freebsd::{FREEBSD_ARCH_SUPPORTED, FreeBsd};
pub use fyne::{ICON_FILE, prepare_icon};

use crate::container::ContainerImage;
use crate::context::BuildContext;
use crate::driver::{self, RetryPolicy, RunSummary};
use crate::error::Result;
use crate::process::CommandRunner;
use std::future::Future;
use std::sync::Arc;

/// A target OS that can build its container images
pub trait PlatformBuilder: Send + Sync + 'static {
    /// Runner used for container commands
    type Runner: CommandRunner + 'static;

    /// Subcommand name, e.g. `"freebsd"`
    fn name(&self) -> &'static str;

    /// One-line description for help output
    fn description(&self) -> &'static str;

    /// Images to build, one per requested architecture
    fn images(&self) -> &[ContainerImage];

    /// Shared build settings
    fn context(&self) -> &BuildContext;

    /// Runner for container commands
    fn runner(&self) -> &Self::Runner;

    /// Build one image and return the artifact file name
    fn build(&self, image: &ContainerImage) -> impl Future<Output = Result<String>> + Send;

    /// Build every image and collect a per-architecture summary
    fn run(self: Arc<Self>, retry: RetryPolicy) -> impl Future<Output = RunSummary> + Send
    where
        Self: Sized,
    {
        driver::run(self, retry)
    }
}
