//! Audit NIM container images against policy and environment rules.
//!
//! # Quick Start
//!
//! Lint an image's `docker inspect` output against the built-in rules:
//!
//! ```bash
//! docker inspect nvcr.io/nim/meta/llama3-8b-instruct:1.0.0 > inspect.json
//! nim-audit lint --image inspect.json
//! ```
//!
//! Add an organization policy, and fail the build when it does not pass:
//!
//! ```bash
//! nim-audit lint --image inspect.json --policy corp-policy.yml --error-if-failed
//! ```
//!
//! Lint the environment an operator will deploy with:
//!
//! ```bash
//! nim-audit env-lint --env-file prod.env --image inspect.json \
//!     --registry env-registry.yml --rules env-rules.yml
//! ```
//!
//! # Reports
//!
//! Both lint commands accept `--format console|json|markdown` and `--output <PATH>`.
//!
//! # Configuration
//!
//! `nim-audit init` writes a commented `nim-audit.yml`. It sets the nesting bounds for
//! conditions and how rules that fail to evaluate are treated. The file is picked up from
//! the current directory, or given explicitly with `--config`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use nim_audit::{Host, run};
use std::io::Write;
use std::io::{stderr, stdout};

/// Default host that runs real OS commands.
#[derive(Debug, Clone, Default)]
pub struct RealHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for RealHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> Result<(), ohno::AppError> {
    run(&mut RealHost, std::env::args())
}
