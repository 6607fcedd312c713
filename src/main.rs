//! Kodegen Bundler Cross - build Fyne applications for other operating
//! systems inside containers.

use kodegen_bundler_cross::cli;
use kodegen_bundler_cross::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.error("Recovery suggestions:");
                for suggestion in suggestions {
                    output.error(&format!("  • {}", suggestion));
                }
            }

            process::exit(1);
        }
    }
}
