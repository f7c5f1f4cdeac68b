use super::Host;
use super::common::{ColorMode, ReportArgs, ReportFormat};
use crate::Result;
use crate::config::Config;
use crate::env::{EnvLintResult, EnvLinter, EnvSurface, Overall, Registry, RulesDocument, load_discovered, load_env_file};
use crate::policy::ImageMetadata;
use crate::reports::{generate_env_console, generate_env_json, generate_env_markdown};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct EnvLintArgs {
    /// Env file with the operator's variables (`KEY=VALUE` per line)
    #[arg(long, value_name = "PATH")]
    pub env_file: Utf8PathBuf,

    /// Path to the `docker inspect` JSON of the image, for its default environment
    #[arg(long, value_name = "PATH")]
    pub image: Option<Utf8PathBuf>,

    /// Environment rules document
    #[arg(long, value_name = "PATH")]
    pub rules: Option<Utf8PathBuf>,

    /// Registry of known environment variables
    #[arg(long, value_name = "PATH")]
    pub registry: Option<Utf8PathBuf>,

    /// Interaction edges between registry variables
    #[arg(long, value_name = "PATH")]
    pub interactions: Option<Utf8PathBuf>,

    /// File listing variable names discovered inside the image, one per line
    #[arg(long, value_name = "PATH")]
    pub discovered: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub report: ReportArgs,

    /// Exit with status code 1 if any finding has FAIL severity
    #[arg(long)]
    pub error_if_failed: bool,
}

fn env_lint_inner(args: &EnvLintArgs, config: &Config, color: ColorMode) -> Result<(EnvLintResult, String)> {
    let mut surface = EnvSurface::from_overlay(load_env_file(&args.env_file)?);
    if let Some(path) = &args.image {
        surface.image_env = ImageMetadata::load(path, None)?.env;
    }
    if let Some(path) = &args.discovered {
        surface.discovered = load_discovered(path)?;
    }

    let registry = Registry::load(args.registry.as_deref(), args.interactions.as_deref())?;
    let rules = args.rules.as_deref().map(RulesDocument::load).transpose()?.unwrap_or_default();

    let result = EnvLinter::new(config).lint(&surface, &registry, &rules)?;

    let mut report = String::new();
    match args.report.format {
        ReportFormat::Console => generate_env_console(&result, args.report.use_colors(color), &mut report)?,
        ReportFormat::Json => generate_env_json(&result, &mut report)?,
        ReportFormat::Markdown => generate_env_markdown(&result, &mut report)?,
    }

    Ok((result, report))
}

pub fn lint_env<H: Host>(host: &mut H, args: &EnvLintArgs, config: &Config, color: ColorMode) -> Result<()> {
    match env_lint_inner(args, config, color).and_then(|(result, report)| args.report.emit(host, &report).map(|()| result)) {
        Ok(result) => {
            if args.error_if_failed && result.overall == Overall::Fail {
                host.exit(1);
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Environment lint failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
