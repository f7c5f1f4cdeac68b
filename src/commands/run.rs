//! Command dispatch logic for nim-audit

use super::common::{GlobalArgs, init_logging};
use super::{
    EnvLintArgs, EvalArgs, InitArgs, LintArgs, TranslateArgs, ValidateArgs, eval_expression, init_config, lint_env, lint_image,
    translate_expression, validate,
};
use crate::config::Config;
use crate::{Host, Result};
use camino::Utf8Path;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "nim-audit", version, long_about = None)]
#[command(about = "Audit NIM container images against policy and environment rules")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: AuditSubcommand,
}

#[derive(Subcommand, Debug)]
enum AuditSubcommand {
    /// Lint an image's metadata against the built-in rules and a policy
    Lint(Box<LintArgs>),
    /// Lint an operator environment against the variable registry and env rules
    EnvLint(Box<EnvLintArgs>),
    /// Evaluate a single expression
    Eval(EvalArgs),
    /// Show how a CEL expression is rewritten for evaluation
    Translate(TranslateArgs),
    /// Check the configuration and the conditions of policy and rules files
    Validate(ValidateArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.global.log_level);

    let load_config = || Config::load(Utf8Path::new("."), cli.global.config.as_ref());

    match &cli.command {
        AuditSubcommand::Lint(args) => lint_image(host, args, &load_config()?, cli.global.color),
        AuditSubcommand::EnvLint(args) => lint_env(host, args, &load_config()?, cli.global.color),
        AuditSubcommand::Eval(args) => eval_expression(host, args, &load_config()?),
        AuditSubcommand::Translate(args) => translate_expression(host, args),
        AuditSubcommand::Validate(args) => validate(host, cli.global.config.as_ref(), args),
        AuditSubcommand::Init(args) => init_config(host, args),
    }
}
