#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for nim-audit
//!
//! nim-audit checks NIM container images before they are deployed. Policy rules
//! and environment rules are written as small expressions that run on a
//! restricted evaluator: only an allow-listed set of syntax, functions and
//! methods is available, attribute access is closed, and nesting is bounded.
//!
//! # Module Organization
//!
//! - [`expr`]: The restricted expression evaluator
//! - [`cel`]: CEL-flavored conditions, translated onto [`expr`]
//! - [`failure_policy`]: How callers treat conditions that fail to evaluate
//! - [`policy`]: Image metadata, policy rules and the policy linter
//! - [`env`]: Environment variable registry, env rules and the environment linter
//! - [`config`]: Startup configuration
//! - [`reports`]: Console, JSON and Markdown rendering of lint results
//! - [`commands`]: Command-line interface and orchestration
//!
//! ```
//! use nim_audit::expr::{Context, evaluate};
//!
//! let ctx = Context::new().with("tag", "1.0.0");
//! assert!(evaluate("tag != 'latest' and tag.startswith('1.')", &ctx).unwrap().is_truthy());
//! ```

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod cel;
pub mod commands;
pub mod config;
pub mod env;
pub mod expr;
pub mod failure_policy;
pub mod policy;
pub mod reports;

pub use crate::commands::{Host, run};
