//! Container image construction per target architecture.

use super::{Architecture, ContainerImage};
use crate::engine::Engine;
use crate::error::{CliError, CrossError};
use std::collections::BTreeMap;

/// FreeBSD OS tag
pub const FREEBSD_OS: &str = "freebsd";
/// Default image for FreeBSD amd64
pub const FREEBSD_IMAGE_AMD64: &str = "fyneio/fyne-cross-images:freebsd-amd64";
/// Default image for FreeBSD arm64
pub const FREEBSD_IMAGE_ARM64: &str = "fyneio/fyne-cross-images:freebsd-arm64";

/// Target OS selector
pub const ENV_GOOS: &str = "GOOS";
/// Target architecture selector
pub const ENV_GOARCH: &str = "GOARCH";
/// C cross compiler
pub const ENV_CC: &str = "CC";
/// C++ cross compiler
pub const ENV_CXX: &str = "CXX";
/// Extra linker flags for cgo
pub const ENV_CGO_LDFLAGS: &str = "CGO_LDFLAGS";

/// Linker flag selecting LLD
pub const LLD_LINKER_FLAG: &str = "-fuse-ld=lld";

/// Sysroot of the FreeBSD images
const FREEBSD_SYSROOT: &str = "/freebsd";

/// Built-in image for an OS/architecture pair
pub fn default_image(os: &str, arch: Architecture) -> Option<&'static str> {
    match (os, arch) {
        (FREEBSD_OS, Architecture::Amd64) => Some(FREEBSD_IMAGE_AMD64),
        (FREEBSD_OS, Architecture::Arm64) => Some(FREEBSD_IMAGE_ARM64),
        _ => None,
    }
}

/// Clang target triple for an OS/architecture pair
fn clang_triple(os: &str, arch: Architecture) -> Option<&'static str> {
    match (os, arch) {
        (FREEBSD_OS, Architecture::Amd64) => Some("x86_64-unknown-freebsd12"),
        (FREEBSD_OS, Architecture::Arm64) => Some("aarch64-unknown-freebsd12"),
        _ => None,
    }
}

/// Whether building `target` from `host` must link with LLD.
///
/// True for arm64 targets on non-arm64 hosts and for amd64 targets on arm64
/// hosts.
pub fn needs_lld(host: Architecture, target: Architecture) -> bool {
    match target {
        Architecture::Arm64 => host != Architecture::Arm64,
        Architecture::Amd64 => host == Architecture::Arm64,
        _ => false,
    }
}

/// Append `flag` to a space-separated variable, keeping what is already set
fn append_flag(env: &mut BTreeMap<String, String>, key: &str, flag: &str) {
    env.entry(key.to_string())
        .and_modify(|value| {
            if value.trim().is_empty() {
                *value = flag.to_string();
            } else {
                value.push(' ');
                value.push_str(flag);
            }
        })
        .or_insert_with(|| flag.to_string());
}

/// Creates [`ContainerImage`]s bound to one resolved engine.
///
/// The factory is pure: the same inputs always produce equal images.
#[derive(Debug, Clone)]
pub struct ImageFactory {
    engine: Engine,
    host_arch: Architecture,
    base_env: BTreeMap<String, String>,
}

impl ImageFactory {
    /// Factory for `engine` on a `host_arch` host.
    ///
    /// `base_env` holds the global overrides; every image starts from its
    /// own copy of it.
    pub fn new(engine: Engine, host_arch: Architecture, base_env: BTreeMap<String, String>) -> Self {
        Self {
            engine,
            host_arch,
            base_env,
        }
    }

    /// Engine the images will run on
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Build the image for `arch` on `os`.
    ///
    /// `reference_override` replaces the built-in image verbatim. Without an
    /// override, pairs that have no built-in image are rejected.
    pub fn create_image(
        &self,
        arch: Architecture,
        os: &str,
        reference_override: Option<&str>,
    ) -> Result<ContainerImage, CrossError> {
        let reference = match reference_override.filter(|r| !r.trim().is_empty()) {
            Some(reference) => reference.to_string(),
            None => default_image(os, arch)
                .ok_or_else(|| CliError::InvalidArguments {
                    reason: format!(
                        "no default image for {}/{}; pass --image to provide one",
                        os, arch
                    ),
                })?
                .to_string(),
        };

        let mut env = self.base_env.clone();
        env.insert(ENV_GOOS.to_string(), os.to_string());
        env.insert(ENV_GOARCH.to_string(), arch.as_str().to_string());

        if let Some(triple) = clang_triple(os, arch) {
            env.insert(
                ENV_CC.to_string(),
                format!("clang --sysroot={} --target={}", FREEBSD_SYSROOT, triple),
            );
            env.insert(
                ENV_CXX.to_string(),
                format!("clang++ --sysroot={} --target={}", FREEBSD_SYSROOT, triple),
            );
        }

        if needs_lld(self.host_arch, arch) {
            append_flag(&mut env, ENV_CGO_LDFLAGS, LLD_LINKER_FLAG);
        }

        Ok(ContainerImage {
            os: os.to_string(),
            arch,
            reference,
            env,
            id: format!("{}-{}", os, arch),
            engine: self.engine.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineKind;
    use std::path::PathBuf;

    fn docker() -> Engine {
        Engine::local(EngineKind::Docker, PathBuf::from("/usr/bin/docker"))
    }

    fn factory(host: Architecture, base: &[(&str, &str)]) -> ImageFactory {
        let env = base
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ImageFactory::new(docker(), host, env)
    }

    #[test]
    fn test_freebsd_amd64_toolchain() {
        let image = factory(Architecture::Amd64, &[])
            .create_image(Architecture::Amd64, FREEBSD_OS, None)
            .unwrap();

        assert_eq!(image.id(), "freebsd-amd64");
        assert_eq!(image.reference(), FREEBSD_IMAGE_AMD64);
        assert_eq!(image.env_var(ENV_GOOS), Some("freebsd"));
        assert_eq!(image.env_var(ENV_GOARCH), Some("amd64"));
        assert_eq!(
            image.env_var(ENV_CC),
            Some("clang --sysroot=/freebsd --target=x86_64-unknown-freebsd12")
        );
        assert_eq!(
            image.env_var(ENV_CXX),
            Some("clang++ --sysroot=/freebsd --target=x86_64-unknown-freebsd12")
        );
        assert_eq!(image.env_var(ENV_CGO_LDFLAGS), None);
    }

    #[test]
    fn test_freebsd_arm64_on_amd64_host_uses_lld() {
        let image = factory(Architecture::Amd64, &[])
            .create_image(Architecture::Arm64, FREEBSD_OS, None)
            .unwrap();

        assert_eq!(image.reference(), FREEBSD_IMAGE_ARM64);
        assert_eq!(image.env_var(ENV_CGO_LDFLAGS), Some(LLD_LINKER_FLAG));
        assert_eq!(
            image.env_var(ENV_CC),
            Some("clang --sysroot=/freebsd --target=aarch64-unknown-freebsd12")
        );
    }

    #[test]
    fn test_lld_flag_is_appended_not_overwritten() {
        let image = factory(Architecture::Amd64, &[(ENV_CGO_LDFLAGS, "-existing")])
            .create_image(Architecture::Arm64, FREEBSD_OS, None)
            .unwrap();
        assert_eq!(image.env_var(ENV_CGO_LDFLAGS), Some("-existing -fuse-ld=lld"));
    }

    #[test]
    fn test_amd64_on_arm64_host_uses_lld() {
        let image = factory(Architecture::Arm64, &[(ENV_CGO_LDFLAGS, "-existing")])
            .create_image(Architecture::Amd64, FREEBSD_OS, None)
            .unwrap();
        assert_eq!(image.env_var(ENV_CGO_LDFLAGS), Some("-existing -fuse-ld=lld"));
    }

    #[test]
    fn test_native_arm64_leaves_ldflags_alone() {
        let image = factory(Architecture::Arm64, &[(ENV_CGO_LDFLAGS, "-existing")])
            .create_image(Architecture::Arm64, FREEBSD_OS, None)
            .unwrap();
        assert_eq!(image.env_var(ENV_CGO_LDFLAGS), Some("-existing"));
    }

    #[test]
    fn test_override_is_used_verbatim() {
        let image = factory(Architecture::Amd64, &[])
            .create_image(Architecture::Amd64, FREEBSD_OS, Some("registry.local/fb:dev"))
            .unwrap();
        assert_eq!(image.reference(), "registry.local/fb:dev");
    }

    #[test]
    fn test_missing_default_image_is_rejected() {
        let result = factory(Architecture::Amd64, &[]).create_image(
            Architecture::I386,
            FREEBSD_OS,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_create_image_is_pure() {
        let factory = factory(Architecture::Amd64, &[("FOO", "bar")]);
        let first = factory
            .create_image(Architecture::Arm64, FREEBSD_OS, None)
            .unwrap();
        let second = factory
            .create_image(Architecture::Arm64, FREEBSD_OS, None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.env(), second.env());
        assert_eq!(first.reference(), second.reference());
    }

    #[test]
    fn test_images_do_not_share_env() {
        let factory = factory(Architecture::Amd64, &[(ENV_CGO_LDFLAGS, "-existing")]);
        let amd64 = factory
            .create_image(Architecture::Amd64, FREEBSD_OS, None)
            .unwrap();
        let arm64 = factory
            .create_image(Architecture::Arm64, FREEBSD_OS, None)
            .unwrap();
        assert_eq!(amd64.env_var(ENV_CGO_LDFLAGS), Some("-existing"));
        assert_eq!(arm64.env_var(ENV_CGO_LDFLAGS), Some("-existing -fuse-ld=lld"));
    }

    #[test]
    fn test_needs_lld_matrix() {
        use Architecture::*;
        assert!(needs_lld(Amd64, Arm64));
        assert!(needs_lld(Arm64, Amd64));
        assert!(!needs_lld(Arm64, Arm64));
        assert!(!needs_lld(Amd64, Amd64));
        assert!(!needs_lld(Amd64, Arm));
    }
}
