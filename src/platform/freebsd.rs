//! FreeBSD target.

use super::PlatformBuilder;
use super::fyne::{package_dir_container, packaging_command, prepare_icon};
use crate::cli::FreeBsdFlags;
use crate::container::{
    Architecture, ContainerImage, FREEBSD_OS, ImageFactory, RunOptions, Session,
    join_path_container,
};
use crate::context::BuildContext;
use crate::engine::resolve_engine;
use crate::error::{BuildError, CliError, Phase, Result};
use crate::process::{CommandRunner, ExecutableLookup};
use std::sync::Arc;

/// Architectures with a FreeBSD image
pub const FREEBSD_ARCH_SUPPORTED: [Architecture; 2] = [Architecture::Amd64, Architecture::Arm64];

/// Leading path components dropped when extracting `usr/local/bin/<app>`
const PACKAGE_STRIP_COMPONENTS: u32 = 3;
/// Path of the executable inside the package
const PACKAGE_BIN_PATH: &str = "usr/local/bin";

/// Builds and packages a Fyne app for FreeBSD
#[derive(Debug)]
pub struct FreeBsd<R> {
    images: Vec<ContainerImage>,
    context: Arc<BuildContext>,
    runner: Arc<R>,
}

impl<R: CommandRunner + 'static> FreeBsd<R> {
    /// Builder over already constructed images
    pub fn new(context: Arc<BuildContext>, images: Vec<ContainerImage>, runner: Arc<R>) -> Self {
        Self {
            images,
            context,
            runner,
        }
    }

    /// Set up the FreeBSD builder from its flags.
    ///
    /// Validates the architectures, resolves the engine once, and creates
    /// one image per architecture. An empty architecture list means the host
    /// architecture.
    pub async fn parse<L: ExecutableLookup>(
        flags: &FreeBsdFlags,
        runner: Arc<R>,
        lookup: &L,
        host_arch: Architecture,
    ) -> Result<Self> {
        let targets = target_archs(&flags.arch, host_arch)?;
        let context = flags.common.build_context()?;
        let engine = resolve_engine(flags.common.engine_token(), &*runner, lookup).await?;

        let factory = ImageFactory::new(engine, host_arch, context.env().clone());
        let mut images = Vec::with_capacity(targets.len());
        for arch in targets {
            images.push(factory.create_image(arch, FREEBSD_OS, flags.common.image.as_deref())?);
        }

        Ok(Self::new(Arc::new(context), images, runner))
    }
}

/// Requested architectures, de-duplicated in request order
fn target_archs(requested: &[Architecture], host: Architecture) -> Result<Vec<Architecture>> {
    let requested = if requested.is_empty() {
        vec![host]
    } else {
        requested.to_vec()
    };

    let mut targets = Vec::with_capacity(requested.len());
    for arch in requested {
        if !FREEBSD_ARCH_SUPPORTED.contains(&arch) {
            return Err(CliError::InvalidArguments {
                reason: format!(
                    "could not make build context for {} OS: arch {} is not supported (supported: {})",
                    FREEBSD_OS,
                    arch,
                    FREEBSD_ARCH_SUPPORTED.map(|a| a.as_str()).join(", ")
                ),
            }
            .into());
        }
        if !targets.contains(&arch) {
            targets.push(arch);
        }
    }
    Ok(targets)
}

impl<R: CommandRunner + 'static> PlatformBuilder for FreeBsd<R> {
    type Runner = R;

    fn name(&self) -> &'static str {
        "freebsd"
    }

    fn description(&self) -> &'static str {
        "Build and package a fyne application for the freebsd OS"
    }

    fn images(&self) -> &[ContainerImage] {
        &self.images
    }

    fn context(&self) -> &BuildContext {
        &self.context
    }

    fn runner(&self) -> &R {
        &self.runner
    }

    async fn build(&self, image: &ContainerImage) -> Result<String> {
        let ctx = &*self.context;
        let package_name = format!("{}.tar.xz", ctx.name());

        log::info!("[{}] Packaging app...", image.id());
        prepare_icon(ctx, image).await?;

        let session = image
            .start(&*self.runner, ctx)
            .await
            .map_err(|e| BuildError::from_phase(Phase::Prepare, image.id(), e))?;
        let outcome = run_phases(&session, ctx, image, &package_name).await;

        // Pods hand the extracted binary back only when every phase passed
        let closed = session.finish(outcome.is_ok()).await;
        outcome?;
        closed.map_err(|e| BuildError::from_phase(Phase::Extract, image.id(), e))?;

        Ok(package_name)
    }
}

/// Package, relocate, then extract inside `session`
async fn run_phases<R: CommandRunner>(
    session: &Session<'_, R>,
    ctx: &BuildContext,
    image: &ContainerImage,
    package_name: &str,
) -> Result<()> {
    let volume = ctx.volume();

    let package_dir = package_dir_container(ctx);
    session
        .run(
            &RunOptions::in_dir(package_dir.clone()),
            &packaging_command(ctx, image),
        )
        .await
        .map_err(|e| BuildError::from_phase(Phase::Package, image.id(), e))?;

    let staged = join_path_container(&volume.tmp_dir_container(), &[image.id(), package_name]);
    log::info!("[{}] Moving package to {}", image.id(), staged);
    let relocate = vec![
        "mv".to_string(),
        join_path_container(&package_dir, &[package_name]),
        staged.clone(),
    ];
    session
        .run(&RunOptions::default(), &relocate)
        .await
        .map_err(|e| BuildError::from_phase(Phase::Relocate, image.id(), e))?;

    let bin_dir = join_path_container(&volume.bin_dir_container(), &[image.id()]);
    log::info!("[{}] Extracting executable into {}", image.id(), bin_dir);
    let extract = vec![
        "tar".to_string(),
        "-xf".to_string(),
        staged,
        format!("--strip-components={}", PACKAGE_STRIP_COMPONENTS),
        PACKAGE_BIN_PATH.to_string(),
    ];
    session
        .run(&RunOptions::in_dir(bin_dir), &extract)
        .await
        .map_err(|e| BuildError::from_phase(Phase::Extract, image.id(), e))?;

    Ok(())
}
