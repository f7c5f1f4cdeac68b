use super::Host;
use super::common::{ColorMode, ReportArgs, ReportFormat};
use crate::Result;
use crate::config::Config;
use crate::policy::{ImageMetadata, LintResult, Policy, PolicyLinter};
use crate::reports::{generate_lint_console, generate_lint_json, generate_lint_markdown};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct LintArgs {
    /// Path to the `docker inspect` JSON of the image
    #[arg(long, value_name = "PATH")]
    pub image: Utf8PathBuf,

    /// Policy file whose rules are checked
    #[arg(long, value_name = "PATH")]
    pub policy: Option<Utf8PathBuf>,

    /// Skip the built-in NIM rules
    #[arg(long)]
    pub no_builtin: bool,

    /// Image reference to report instead of the one found in the inspect data
    #[arg(long, value_name = "REF")]
    pub reference: Option<String>,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Exit with status code 1 if the lint fails
    #[arg(long)]
    pub error_if_failed: bool,
}

fn lint_inner(args: &LintArgs, config: &Config, color: ColorMode) -> Result<(LintResult, String)> {
    let image = ImageMetadata::load(&args.image, args.reference.as_deref())?;
    let policy = args.policy.as_deref().map(Policy::load).transpose()?;
    let include_builtin = config.include_builtin_rules && !args.no_builtin;

    let result = PolicyLinter::new(config).lint(&image, policy.as_ref(), include_builtin);

    let mut report = String::new();
    match args.report.format {
        ReportFormat::Console => generate_lint_console(&result, args.report.use_colors(color), &mut report)?,
        ReportFormat::Json => generate_lint_json(&result, &mut report)?,
        ReportFormat::Markdown => generate_lint_markdown(&result, &mut report)?,
    }

    Ok((result, report))
}

pub fn lint_image<H: Host>(host: &mut H, args: &LintArgs, config: &Config, color: ColorMode) -> Result<()> {
    match lint_inner(args, config, color).and_then(|(result, report)| args.report.emit(host, &report).map(|()| result)) {
        Ok(result) => {
            if args.error_if_failed && !result.passed() {
                host.exit(1);
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Policy lint failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
