//! Host and container directory layout.
//!
//! The host work dir is bind-mounted at [`CONTAINER_WORK_DIR`] and the host
//! cache dir at [`CONTAINER_CACHE_DIR`]. Temporary packages and extracted
//! binaries live under `fyne-cross/` inside the work dir, so they are visible
//! on the host as soon as the container writes them.

use crate::error::{CliError, CrossError};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Mount point of the host work dir
pub const CONTAINER_WORK_DIR: &str = "/app";
/// Mount point of the host Go cache
pub const CONTAINER_CACHE_DIR: &str = "/go";

const OUTPUT_DIR: &str = "fyne-cross";
const TMP_DIR: &str = "tmp";
const BIN_DIR: &str = "bin";

/// Paired host/container directories for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    work_dir_host: PathBuf,
    cache_dir_host: PathBuf,
}

impl Volume {
    /// Build the layout from host directories.
    ///
    /// Both paths are made absolute against the current directory. A host
    /// root equal to its container mount point is rejected.
    pub fn new(work_dir_host: &Path, cache_dir_host: &Path) -> Result<Self, CrossError> {
        let work_dir_host = work_dir_host.absolutize()?.into_owned();
        let cache_dir_host = cache_dir_host.absolutize()?.into_owned();

        for (host, container) in [
            (&work_dir_host, CONTAINER_WORK_DIR),
            (&cache_dir_host, CONTAINER_CACHE_DIR),
        ] {
            if host == Path::new(container) {
                return Err(CliError::InvalidArguments {
                    reason: format!(
                        "host directory {} collides with its container mount point",
                        host.display()
                    ),
                }
                .into());
            }
        }

        Ok(Self {
            work_dir_host,
            cache_dir_host,
        })
    }

    /// Absolute host work dir
    pub fn work_dir_host(&self) -> &Path {
        &self.work_dir_host
    }

    /// Absolute host cache dir
    pub fn cache_dir_host(&self) -> &Path {
        &self.cache_dir_host
    }

    /// Host directory for staged packages and icons
    pub fn tmp_dir_host(&self) -> PathBuf {
        self.work_dir_host.join(OUTPUT_DIR).join(TMP_DIR)
    }

    /// Host directory for extracted binaries
    pub fn bin_dir_host(&self) -> PathBuf {
        self.work_dir_host.join(OUTPUT_DIR).join(BIN_DIR)
    }

    /// Container work dir
    pub fn work_dir_container(&self) -> String {
        CONTAINER_WORK_DIR.to_string()
    }

    /// Container cache dir
    pub fn cache_dir_container(&self) -> String {
        CONTAINER_CACHE_DIR.to_string()
    }

    /// Container directory for staged packages and icons
    pub fn tmp_dir_container(&self) -> String {
        join_path_container(CONTAINER_WORK_DIR, &[OUTPUT_DIR, TMP_DIR])
    }

    /// Container directory for extracted binaries
    pub fn bin_dir_container(&self) -> String {
        join_path_container(CONTAINER_WORK_DIR, &[OUTPUT_DIR, BIN_DIR])
    }
}

/// Join container path segments with `/` whatever the host separator is.
///
/// Empty and `.` segments are skipped and redundant slashes collapsed.
pub fn join_path_container(base: &str, parts: &[&str]) -> String {
    let mut joined = base.trim_end_matches('/').to_string();
    for part in parts {
        let part = part.trim_matches('/');
        if part.is_empty() || part == "." {
            continue;
        }
        joined.push('/');
        joined.push_str(part);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}
