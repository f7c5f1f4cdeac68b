//! Formatting shared by the report generators.

use crate::env::EnvLintResult;
use crate::policy::LintResult;

pub fn lint_status(result: &LintResult) -> &'static str {
    if result.passed() { "PASSED" } else { "FAILED" }
}

fn plural(count: usize, singular: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {singular}s")
    }
}

pub fn lint_summary(result: &LintResult) -> String {
    format!(
        "{}, {}, {} info",
        plural(result.error_count(), "error"),
        plural(result.warning_count(), "warning"),
        result.info_count()
    )
}

pub fn env_summary(result: &EnvLintResult) -> String {
    format!("{} fail, {} warn, {} info", result.counts.fail, result.counts.warn, result.counts.info)
}

/// Makes text safe to place in a Markdown table cell.
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(0, "error"), "0 errors");
        assert_eq!(plural(1, "error"), "1 error");
        assert_eq!(plural(2, "warning"), "2 warnings");
    }

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("a|b\nc"), "a\\|b c");
    }
}
