//! # Kodegen Bundler Cross
//!
//! Container-based cross-compilation and packaging for Fyne applications.
//!
//! Each requested architecture gets its own container image. The images are
//! built concurrently on a container engine chosen once per run: docker,
//! podman, or a Kubernetes cluster reached through `kubectl`.
//!
//! ## Features
//!
//! - **Engine Resolution**: Explicit engine tokens or autodetection
//! - **Per-Architecture Toolchains**: Clang sysroot and target triple per image
//! - **Phased Builds**: Package, relocate and extract, each with its own error
//! - **Concurrent Targets**: One task per architecture with optional retries
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_cross freebsd                         # Host architecture
//! kodegen_bundler_cross freebsd --arch amd64,arm64      # Both FreeBSD targets
//! kodegen_bundler_cross freebsd --engine podman --json  # Machine-readable summary
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod container;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod platform;
pub mod process;

pub use cli::Args;
pub use container::{Architecture, ContainerImage, ImageFactory, Volume};
pub use context::BuildContext;
pub use driver::{BuildReport, RetryPolicy, RunSummary};
pub use engine::{Engine, EngineKind, resolve_engine};
pub use error::{BuildError, CliError, CrossError, EngineError, ProcessError, Result};
pub use platform::{FreeBsd, PlatformBuilder};
pub use process::{CommandRunner, ExecutableLookup, SystemRunner, WhichLookup};
