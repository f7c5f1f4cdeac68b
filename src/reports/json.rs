use super::common;
use crate::Result;
use crate::env::EnvLintResult;
use crate::policy::{LintResult, LintViolation};
use core::fmt::Write;
use serde_json::json;

#[expect(unused_results, reason = "Map::insert intentionally overwrites values")]
pub fn generate_lint<W: Write>(result: &LintResult, writer: &mut W) -> Result<()> {
    let mut obj = serde_json::Map::new();
    obj.insert("image".to_string(), json!(result.image_reference));
    obj.insert(
        "policy".to_string(),
        json!({
            "name": result.policy_name,
            "version": result.policy_version,
        }),
    );
    obj.insert("status".to_string(), json!(common::lint_status(result)));
    obj.insert("success".to_string(), json!(result.success));
    obj.insert(
        "summary".to_string(),
        json!({
            "errors": result.error_count(),
            "warnings": result.warning_count(),
            "info": result.info_count(),
        }),
    );
    obj.insert(
        "violations".to_string(),
        json!(result.violations.iter().map(violation_to_json).collect::<Vec<_>>()),
    );
    obj.insert("evaluation_failures".to_string(), json!(result.evaluation_failures));
    obj.insert("errors".to_string(), json!(result.errors));

    write!(writer, "{}", serde_json::to_string_pretty(&obj)?)?;
    Ok(())
}

#[expect(unused_results, reason = "Map::insert intentionally overwrites values")]
fn violation_to_json(violation: &LintViolation) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("rule_id".to_string(), json!(violation.rule.id));
    obj.insert("rule_name".to_string(), json!(violation.rule.name));
    obj.insert("category".to_string(), json!(violation.rule.category));
    obj.insert("severity".to_string(), json!(violation.severity));
    obj.insert("message".to_string(), json!(violation.message));
    obj.insert("location".to_string(), json!(violation.location));
    if let Some(remediation) = &violation.rule.remediation {
        obj.insert("remediation".to_string(), json!(remediation));
    }
    serde_json::Value::Object(obj)
}

pub fn generate_env<W: Write>(result: &EnvLintResult, writer: &mut W) -> Result<()> {
    write!(writer, "{}", serde_json::to_string_pretty(result)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Finding, Severity};
    use crate::policy::{Rule, RuleSeverity};

    fn lint_result() -> LintResult {
        let rule = Rule::new("nim-004", "check-exposed-ports", "False")
            .with_description("NIM should expose the standard API port")
            .with_category("configuration");
        LintResult {
            success: true,
            image_reference: "local/nim:dev".to_string(),
            policy_name: "builtin".to_string(),
            policy_version: "1.0.0".to_string(),
            violations: vec![LintViolation {
                severity: RuleSeverity::Warning,
                message: rule.description.clone(),
                location: "local/nim:dev".to_string(),
                rule,
            }],
            evaluation_failures: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_lint_json() {
        let mut output = String::new();
        generate_lint(&lint_result(), &mut output).unwrap();
        insta::assert_snapshot!(output, @r#"
        {
          "errors": [],
          "evaluation_failures": [],
          "image": "local/nim:dev",
          "policy": {
            "name": "builtin",
            "version": "1.0.0"
          },
          "status": "PASSED",
          "success": true,
          "summary": {
            "errors": 0,
            "info": 0,
            "warnings": 1
          },
          "violations": [
            {
              "category": "configuration",
              "location": "local/nim:dev",
              "message": "NIM should expose the standard API port",
              "rule_id": "nim-004",
              "rule_name": "check-exposed-ports",
              "severity": "warning"
            }
          ]
        }
        "#);
    }

    #[test]
    fn test_lint_json_parses() {
        let mut result = lint_result();
        result.success = false;
        result.errors.push("boom".to_string());

        let mut output = String::new();
        generate_lint(&result, &mut output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["status"], "FAILED");
        assert_eq!(parsed["errors"][0], "boom");
    }

    #[test]
    fn test_env_json() {
        let result = EnvLintResult::from_findings(vec![Finding::new("ENV-MEMORY", Severity::Warn, "more memory").for_env("NIM_X")]);
        let mut output = String::new();
        generate_env(&result, &mut output).unwrap();
        insta::assert_snapshot!(output, @r#"
        {
          "overall": "WARN",
          "findings": [
            {
              "id": "ENV-MEMORY",
              "severity": "WARN",
              "env": "NIM_X",
              "message": "more memory"
            }
          ],
          "counts": {
            "info": 0,
            "warn": 1,
            "fail": 0
          }
        }
        "#);
    }
}
