use super::common;
use crate::Result;
use crate::env::{EnvLintResult, Overall, Severity};
use crate::policy::{LintResult, RuleSeverity};
use core::fmt::Write;
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

const DETAIL_INDENT: usize = 6;

pub fn generate_lint<W: Write>(result: &LintResult, use_colors: bool, writer: &mut W) -> Result<()> {
    write_lint(result, use_colors, get_terminal_width(), writer)
}

pub fn generate_env<W: Write>(result: &EnvLintResult, use_colors: bool, writer: &mut W) -> Result<()> {
    write_env(result, use_colors, get_terminal_width(), writer)
}

fn write_lint<W: Write>(result: &LintResult, use_colors: bool, width: usize, writer: &mut W) -> Result<()> {
    let status = common::lint_status(result);
    let colored_status = if !use_colors {
        status.to_string()
    } else if result.passed() {
        status.green().bold().to_string()
    } else {
        status.red().bold().to_string()
    };

    writeln!(writer, "Image  : {}", result.image_reference)?;
    writeln!(writer, "Policy : {} v{}", result.policy_name, result.policy_version)?;
    writeln!(writer, "Result : {colored_status}")?;

    if !result.violations.is_empty() {
        writeln!(writer)?;
        write_heading(writer, "Violations", use_colors)?;

        for violation in &result.violations {
            let severity = format!("[{}]", violation.severity);
            let severity = if use_colors {
                match violation.severity {
                    RuleSeverity::Error => severity.red().bold().to_string(),
                    RuleSeverity::Warning => severity.yellow().bold().to_string(),
                    RuleSeverity::Info => severity.blue().to_string(),
                }
            } else {
                severity
            };

            writeln!(writer, "  🗙 {severity} {} {}", violation.rule.id, violation.rule.name)?;
            write_detail(writer, &violation.message, width)?;
            if let Some(remediation) = &violation.rule.remediation {
                write_detail(writer, &format!("Remediation: {remediation}"), width)?;
            }
        }
    }

    if !result.evaluation_failures.is_empty() {
        writeln!(writer)?;
        write_heading(writer, "Rules that could not be evaluated (counted as passed)", use_colors)?;
        for failure in &result.evaluation_failures {
            writeln!(writer, "  ⚠ {} ({})", failure.rule_id, failure.kind)?;
            write_detail(writer, &failure.message, width)?;
        }
    }

    if !result.errors.is_empty() {
        writeln!(writer)?;
        write_heading(writer, "Errors", use_colors)?;
        for error in &result.errors {
            writeln!(writer, "  ❌ {error}")?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "Summary: {}", common::lint_summary(result))?;
    Ok(())
}

fn write_env<W: Write>(result: &EnvLintResult, use_colors: bool, width: usize, writer: &mut W) -> Result<()> {
    let status = result.overall.to_string();
    let colored_status = if use_colors {
        match result.overall {
            Overall::Pass => status.green().bold().to_string(),
            Overall::Warn => status.yellow().bold().to_string(),
            Overall::Fail => status.red().bold().to_string(),
        }
    } else {
        status
    };

    writeln!(writer, "Status : {colored_status}")?;
    writeln!(writer, "Summary: {}", common::env_summary(result))?;
    writeln!(writer)?;

    if result.findings.is_empty() {
        if use_colors {
            writeln!(writer, "{}", "No issues found!".green())?;
        } else {
            writeln!(writer, "No issues found!")?;
        }
        return Ok(());
    }

    write_heading(writer, "Findings", use_colors)?;
    for finding in &result.findings {
        let severity = format!("{:<4}", finding.severity);
        let severity = if use_colors {
            match finding.severity {
                Severity::Fail => severity.red().bold().to_string(),
                Severity::Warn => severity.yellow().to_string(),
                Severity::Info => severity.blue().to_string(),
            }
        } else {
            severity
        };

        match &finding.env {
            Some(env) => writeln!(writer, "  {severity} {} {env}", finding.id)?,
            None => writeln!(writer, "  {severity} {}", finding.id)?,
        }
        write_detail(writer, &finding.message, width)?;
    }

    Ok(())
}

fn write_heading<W: Write>(writer: &mut W, text: &str, use_colors: bool) -> Result<()> {
    if use_colors {
        writeln!(writer, "{}", text.bold())?;
    } else {
        writeln!(writer, "{text}")?;
    }
    Ok(())
}

fn write_detail<W: Write>(writer: &mut W, text: &str, width: usize) -> Result<()> {
    let wrapped_lines = wrap_text(text, width, DETAIL_INDENT);
    if let Some(first_line) = wrapped_lines.first() {
        writeln!(writer, "{:DETAIL_INDENT$}{first_line}", "")?;
        for line in wrapped_lines.iter().skip(1) {
            writeln!(writer, "{line}")?;
        }
    }
    Ok(())
}

/// Get the terminal width, defaulting to 80 if not detectable
fn get_terminal_width() -> usize {
    terminal_size().map_or(80, |(Width(w), _)| usize::from(w))
}

/// Word-wrap text to fit within a given width, with indentation for continuation lines
///
/// The first line is returned unindented, as the caller positions it.
fn wrap_text(text: &str, width: usize, indent: usize) -> Vec<String> {
    if width <= indent {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        let separator_len = usize::from(!current_line.is_empty());
        let line_width = indent + current_line.chars().count();

        if !current_line.is_empty() && line_width + separator_len + word.chars().count() > width {
            lines.push(if lines.is_empty() {
                current_line
            } else {
                format!("{:indent$}{current_line}", "")
            });
            current_line = word.to_string();
        } else {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() {
        lines.push(if lines.is_empty() {
            current_line
        } else {
            format!("{:indent$}{current_line}", "")
        });
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Finding;
    use crate::expr::ErrorKind;
    use crate::policy::{EvaluationFailure, LintViolation, Rule};

    fn lint_result() -> LintResult {
        let rule = Rule::new("nim-001", "require-version-label", "False")
            .with_description("NIM images must have a version label")
            .with_severity(RuleSeverity::Error)
            .with_remediation("Add com.nvidia.nim.version label to image");
        LintResult {
            success: true,
            image_reference: "nvcr.io/nim/llama:1.0".to_string(),
            policy_name: "builtin".to_string(),
            policy_version: "1.0.0".to_string(),
            violations: vec![LintViolation {
                severity: RuleSeverity::Error,
                message: rule.description.clone(),
                location: "nvcr.io/nim/llama:1.0".to_string(),
                rule,
            }],
            evaluation_failures: vec![EvaluationFailure {
                rule_id: "ent-9".to_string(),
                kind: ErrorKind::UnknownVariable,
                message: "Unknown variable: gpu".to_string(),
            }],
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_lint_report_no_colors() {
        let mut output = String::new();
        write_lint(&lint_result(), false, 80, &mut output).unwrap();
        insta::assert_snapshot!(output, @r"
        Image  : nvcr.io/nim/llama:1.0
        Policy : builtin v1.0.0
        Result : FAILED

        Violations
          🗙 [error] nim-001 require-version-label
              NIM images must have a version label
              Remediation: Add com.nvidia.nim.version label to image

        Rules that could not be evaluated (counted as passed)
          ⚠ ent-9 (unknown_variable)
              Unknown variable: gpu

        Summary: 1 error, 0 warnings, 0 info
        ");
    }

    #[test]
    fn test_lint_report_with_colors() {
        let mut output = String::new();
        write_lint(&lint_result(), true, 80, &mut output).unwrap();
        assert!(output.contains("\x1b["));
        assert!(output.contains("nim-001"));
    }

    #[test]
    fn test_lint_report_errors() {
        let mut result = lint_result();
        result.violations.clear();
        result.evaluation_failures.clear();
        result.success = false;
        result.errors.push("Failed to evaluate rule x: boom".to_string());

        let mut output = String::new();
        write_lint(&result, false, 80, &mut output).unwrap();
        assert!(output.contains("Result : FAILED"));
        assert!(output.contains("  ❌ Failed to evaluate rule x: boom"));
        assert!(!output.contains("Violations"));
    }

    #[test]
    fn test_env_report() {
        let result = EnvLintResult::from_findings(vec![
            Finding::new("ENV-UNKNOWN", Severity::Warn, "Env var not recognized (not in registry and not discovered in image).")
                .for_env("TYPO"),
            Finding::new("BATCH", Severity::Fail, "batch too large"),
        ]);

        let mut output = String::new();
        write_env(&result, false, 60, &mut output).unwrap();
        insta::assert_snapshot!(output, @r"
        Status : FAIL
        Summary: 1 fail, 1 warn, 0 info

        Findings
          WARN ENV-UNKNOWN TYPO
              Env var not recognized (not in registry and not
              discovered in image).
          FAIL BATCH
              batch too large
        ");
    }

    #[test]
    fn test_env_report_clean() {
        let mut output = String::new();
        write_env(&EnvLintResult::from_findings(Vec::new()), false, 80, &mut output).unwrap();
        assert_eq!(output, "Status : PASS\nSummary: 0 fail, 0 warn, 0 info\n\nNo issues found!\n");
    }

    #[test]
    fn test_wrap_text_short() {
        let lines = wrap_text("short text", 80, 10);
        assert_eq!(lines, vec!["short text"]);
    }

    #[test]
    fn test_wrap_text_long() {
        let text = "This is a very long text that should be wrapped at word boundaries when it exceeds the specified width";
        let lines = wrap_text(text, 40, 10);
        assert!(lines.len() > 1);
        assert!(!lines[0].starts_with(' '));
        assert!(lines[1].starts_with("          "));
        assert!(lines.iter().all(|l| l.chars().count() <= 40));
    }

    #[test]
    fn test_wrap_text_empty() {
        assert_eq!(wrap_text("", 80, 10), vec![String::new()]);
    }

    #[test]
    fn test_wrap_text_narrow() {
        assert_eq!(wrap_text("a b", 4, 4), vec!["a b"]);
    }
}
