//! Command line interface for kodegen_bundler_cross.
//!
//! Parses the target subcommand, builds every requested architecture and
//! reports the outcome per architecture.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, CommonFlags, FreeBsdFlags, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}

