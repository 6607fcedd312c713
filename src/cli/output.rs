//! Colored terminal output for build progress and results

use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output.
///
/// Normal output goes to stdout and errors to stderr. Quiet mode drops
/// everything except errors.
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    /// Print `symbol` in `color`, then the message
    fn tagged(&self, symbol: &str, color: Color, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.stdout.buffer();
        buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(&mut buffer, "{}", symbol)?;
        buffer.reset()?;
        writeln!(&mut buffer, " {}", message)?;
        self.stdout.print(&buffer)
    }

    /// Print an info message
    pub fn info(&self, message: &str) -> std::io::Result<()> {
        self.tagged("ℹ", Color::Cyan, message)
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.tagged("✓", Color::Green, message)
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.tagged("⚠", Color::Yellow, message)
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        fn write_stderr(message: &str) -> std::io::Result<()> {
            let stderr = BufferWriter::stderr(ColorChoice::Auto);
            let mut buffer = stderr.buffer();
            buffer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(&mut buffer, "✗")?;
            buffer.reset()?;
            writeln!(&mut buffer, " {}", message)?;
            stderr.print(&buffer)
        }

        if write_stderr(message).is_err() {
            eprintln!("✗ {}", message);
        }
    }

    /// Print a section header, e.g. the target being built
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.stdout.buffer();
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
        writeln!(&mut buffer, "═══ {} ═══", title)?;
        buffer.reset()?;
        self.stdout.print(&buffer)
    }

    /// Print indented text (container output, sub-items)
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.println(&format!("    {}", message))
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.stdout.buffer();
        writeln!(&mut buffer, "{}", message)?;
        self.stdout.print(&buffer)
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_suppresses_normal_output() {
        let output = OutputManager::new(true, true);
        assert!(output.is_quiet());
        assert!(output.success("built").is_ok());
        assert!(output.indent("line").is_ok());
    }

    #[test]
    fn test_clone_keeps_modes() {
        let output = OutputManager::new(true, false).clone();
        assert!(output.is_verbose());
        assert!(!output.is_quiet());
    }
}
