//! Options and plumbing shared by the subcommands.

use super::Host;
use crate::Result;
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use ohno::IntoAppError;
use std::fs;
use std::io::{IsTerminal, Write};

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Report format for lint results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output
    Console,

    /// Machine-readable JSON
    Json,

    /// Markdown tables
    Markdown,
}

/// Options applying to every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to configuration file (default is `nim-audit.yml` in the current directory)
    #[arg(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto", global = true)]
    pub color: ColorMode,
}

/// Where and how a lint report is written
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Report format
    #[arg(long, value_name = "FORMAT", default_value = "console")]
    pub format: ReportFormat,

    /// Write the report to a file instead of the terminal
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

impl ReportArgs {
    /// Whether console reports should carry ANSI colors.
    pub fn use_colors(&self, color: ColorMode) -> bool {
        match color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => self.output.is_none() && std::io::stdout().is_terminal(),
        }
    }

    /// Sends a rendered report to the output file, or to the host's output.
    pub fn emit<H: Host>(&self, host: &mut H, report: &str) -> Result<()> {
        if let Some(path) = &self.output {
            fs::write(path, report).into_app_err_with(|| format!("writing report to '{path}'"))?;
            let _ = writeln!(host.output(), "Report written to {path}");
        } else {
            let _ = write!(host.output(), "{report}");
            if !report.ends_with('\n') {
                let _ = writeln!(host.output());
            }
        }
        Ok(())
    }
}

/// Initialize logger based on log level
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // a second `run` in the same process keeps the first logger
    _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;

    fn report_args(output: Option<Utf8PathBuf>) -> ReportArgs {
        ReportArgs {
            format: ReportFormat::Console,
            output,
        }
    }

    #[test]
    fn test_use_colors() {
        assert!(report_args(None).use_colors(ColorMode::Always));
        assert!(!report_args(None).use_colors(ColorMode::Never));
        assert!(!report_args(Some(Utf8PathBuf::from("r.txt"))).use_colors(ColorMode::Auto));
    }

    #[test]
    fn test_emit_to_host() {
        let mut host = TestHost::new();
        report_args(None).emit(&mut host, "line one").unwrap();
        report_args(None).emit(&mut host, "line two\n").unwrap();
        assert_eq!(host.output_text(), "line one\nline two\n");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_emit_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("report.md")).unwrap();

        let mut host = TestHost::new();
        report_args(Some(path.clone())).emit(&mut host, "# Report\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "# Report\n");
        assert_eq!(host.output_text(), format!("Report written to {path}\n"));
    }
}
