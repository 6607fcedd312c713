//! `freebsd` subcommand.

use crate::cli::{FreeBsdFlags, RuntimeConfig};
use crate::container::Architecture;
use crate::driver::RunSummary;
use crate::error::{CliError, Result};
use crate::platform::{FreeBsd, PlatformBuilder};
use crate::process::{SystemRunner, WhichLookup};
use std::sync::Arc;

/// Resolve the engine, build every requested architecture and return the
/// summary.
pub(super) async fn execute_freebsd(
    flags: &FreeBsdFlags,
    config: &RuntimeConfig,
) -> Result<RunSummary> {
    let retry = flags.common.retry_policy();
    retry
        .validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let mut runner = SystemRunner::new(flags.common.timeout());
    if config.is_verbose() {
        runner = runner.with_output(config.output().clone());
    }

    let builder = FreeBsd::parse(flags, Arc::new(runner), &WhichLookup, Architecture::host()).await?;

    let _ = config.output().section(builder.description());
    for image in builder.images() {
        let _ = config.output().info(&format!(
            "[{}] {} via {}",
            image.id(),
            image.reference(),
            image.engine()
        ));
    }

    Ok(Arc::new(builder).run(retry).await)
}
