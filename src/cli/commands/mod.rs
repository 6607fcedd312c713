//! Command execution for each target subcommand.

mod freebsd;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::driver::RunSummary;
use crate::error::Result;

use freebsd::execute_freebsd;

/// Execute the subcommand selected by `args` and return the exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(2);
    }

    let config = RuntimeConfig::from(&args);

    let summary = match &args.command {
        Command::Freebsd(flags) => execute_freebsd(flags, &config).await?,
    };

    report(&summary, &config)?;
    Ok(summary.exit_code())
}

/// Print the per-architecture outcome, as JSON when requested
fn report(summary: &RunSummary, config: &RuntimeConfig) -> Result<()> {
    if config.is_json() {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    for report in &summary.reports {
        match (&report.artifact, &report.error) {
            (Some(artifact), None) => {
                config.success_println(&format!("[{}] {}", report.id, artifact));
                config.indent(&format!("executable in {}", report.bin_dir.display()));
            }
            (_, Some(error)) => {
                config.error_println(&format!("[{}] {}", report.id, error));
            }
            (None, None) => {}
        }
        if report.attempts > 1 {
            config.indent(&format!("{} attempts", report.attempts));
        }
    }

    let failed = summary.failed().count();
    if failed == 0 {
        config.success_println(&format!(
            "{} architecture(s) built",
            summary.reports.len()
        ));
    } else {
        config.warning_println(&format!(
            "{} of {} architecture(s) failed",
            failed,
            summary.reports.len()
        ));
    }
    Ok(())
}
