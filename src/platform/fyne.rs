//! Fyne packaging commands and resource staging.

use crate::container::{ContainerImage, join_path_container};
use crate::context::BuildContext;
use crate::error::{CliError, Result};

/// Name of the staged icon inside the per-image tmp dir
pub const ICON_FILE: &str = "Icon.png";

/// Copy the application icon into `<tmp>/<image id>/Icon.png` on the host.
///
/// The tmp dir is inside the work dir, so the packaging command sees it at
/// the matching container path once the work dir is mounted or copied in.
pub async fn prepare_icon(ctx: &BuildContext, image: &ContainerImage) -> Result<()> {
    let icon = ctx.icon();
    if !tokio::fs::try_exists(icon).await.unwrap_or(false) {
        return Err(CliError::ExecutionFailed {
            command: "prepare icon".to_string(),
            reason: format!(
                "icon not found at {}\n\
                 \n\
                 Provide one with --icon or place {} in the work dir.",
                icon.display(),
                ICON_FILE
            ),
        }
        .into());
    }

    let staging = ctx.volume().tmp_dir_host().join(image.id());
    tokio::fs::create_dir_all(&staging).await?;
    tokio::fs::copy(icon, staging.join(ICON_FILE)).await?;
    log::debug!(
        "[{}] Staged icon {} in {}",
        image.id(),
        icon.display(),
        staging.display()
    );
    Ok(())
}

/// Container directory the packaging command runs in
pub(crate) fn package_dir_container(ctx: &BuildContext) -> String {
    join_path_container(&ctx.volume().work_dir_container(), &[ctx.package()])
}

/// `fyne release` in release mode, `fyne package` otherwise
pub(crate) fn packaging_command(ctx: &BuildContext, image: &ContainerImage) -> Vec<String> {
    let subcommand = if ctx.release() { "release" } else { "package" };
    let icon = join_path_container(&ctx.volume().tmp_dir_container(), &[image.id(), ICON_FILE]);

    let mut args: Vec<String> = vec![
        "fyne".into(),
        subcommand.into(),
        "-os".into(),
        image.os().into(),
        "-name".into(),
        ctx.name().into(),
        "-icon".into(),
        icon,
        "-appBuild".into(),
        ctx.app_build().to_string(),
        "-appVersion".into(),
        ctx.app_version().into(),
    ];
    if let Some(app_id) = ctx.app_id() {
        args.push("-appID".into());
        args.push(app_id.into());
    }
    args
}
