//! Command-line interface for nim-audit
//!
//! The `run` function parses the command line with clap and routes to one
//! handler per subcommand:
//!
//! - **lint**: check image metadata against the built-in rules and a policy file
//! - **env-lint**: check an operator environment against the variable registry
//!   and an environment rules document
//! - **eval**: evaluate a single expression, optionally as CEL
//! - **translate**: print the rewritten form of a CEL expression
//! - **validate**: check the configuration and parse every rule condition
//! - **init**: write the default configuration file
//!
//! Handlers write through a [`Host`] so they can be driven from tests. A handler
//! that fails reports the error on the host's error stream and exits with status 1.

mod common;
mod env_lint;
mod eval;
mod host;
mod init;
mod lint;
mod run;
mod translate;
mod validate;

pub use common::{ColorMode, LogLevel, ReportArgs, ReportFormat};
pub use env_lint::{EnvLintArgs, lint_env};
pub use eval::{EvalArgs, eval_expression};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use lint::{LintArgs, lint_image};
pub use run::run;
pub use translate::{TranslateArgs, translate_expression};
pub use validate::{ValidateArgs, validate};
