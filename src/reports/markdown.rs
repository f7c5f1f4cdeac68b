use super::common;
use crate::Result;
use crate::env::EnvLintResult;
use crate::policy::LintResult;
use core::fmt::Write;

pub fn generate_lint<W: Write>(result: &LintResult, writer: &mut W) -> Result<()> {
    writeln!(writer, "# Policy Lint Report")?;
    writeln!(writer)?;
    writeln!(writer, "- **Image:** `{}`", result.image_reference)?;
    writeln!(writer, "- **Policy:** {} v{}", result.policy_name, result.policy_version)?;
    writeln!(writer, "- **Result:** {}", common::lint_status(result))?;
    writeln!(writer)?;

    writeln!(writer, "## Violations")?;
    writeln!(writer)?;
    if result.violations.is_empty() {
        writeln!(writer, "No violations found.")?;
    } else {
        writeln!(writer, "| Severity | Rule | Name | Message |")?;
        writeln!(writer, "|----------|------|------|---------|")?;
        for v in &result.violations {
            writeln!(
                writer,
                "| {} | {} | {} | {} |",
                v.severity,
                common::escape_cell(&v.rule.id),
                common::escape_cell(&v.rule.name),
                common::escape_cell(&v.message)
            )?;
        }
    }

    if !result.evaluation_failures.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "## Unevaluated Rules")?;
        writeln!(writer)?;
        for failure in &result.evaluation_failures {
            writeln!(writer, "- `{}` ({}): {}", failure.rule_id, failure.kind, failure.message)?;
        }
    }

    if !result.errors.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "## Errors")?;
        writeln!(writer)?;
        for error in &result.errors {
            writeln!(writer, "- {error}")?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "**Summary:** {}", common::lint_summary(result))?;
    Ok(())
}

pub fn generate_env<W: Write>(result: &EnvLintResult, writer: &mut W) -> Result<()> {
    writeln!(writer, "# Environment Lint Report")?;
    writeln!(writer)?;
    writeln!(writer, "- **Status:** {}", result.overall)?;
    writeln!(writer, "- **Summary:** {}", common::env_summary(result))?;
    writeln!(writer)?;

    if result.findings.is_empty() {
        writeln!(writer, "No issues found.")?;
        return Ok(());
    }

    writeln!(writer, "| Severity | Id | Env | Message |")?;
    writeln!(writer, "|----------|----|-----|---------|")?;
    for f in &result.findings {
        writeln!(
            writer,
            "| {} | {} | {} | {} |",
            f.severity,
            common::escape_cell(&f.id),
            f.env.as_deref().map(common::escape_cell).unwrap_or_default(),
            common::escape_cell(&f.message)
        )?;
    }
    Ok(())
}
