//! Report generation for lint results
//!
//! Both policy lint results ([`LintResult`](crate::policy::LintResult)) and
//! environment lint results ([`EnvLintResult`](crate::env::EnvLintResult))
//! can be rendered in three formats:
//! - **Console**: Terminal output with optional ANSI colors, wrapped to the terminal width
//! - **JSON**: Machine-readable structured data
//! - **Markdown**: Tables suitable for pull request comments and wikis
//!
//! Every generator writes to a `core::fmt::Write` sink so callers can render
//! into a `String` and decide where it goes.

mod common;
mod console;
mod json;
mod markdown;

pub use console::generate_env as generate_env_console;
pub use console::generate_lint as generate_lint_console;
pub use json::generate_env as generate_env_json;
pub use json::generate_lint as generate_lint_json;
pub use markdown::generate_env as generate_env_markdown;
pub use markdown::generate_lint as generate_lint_markdown;
