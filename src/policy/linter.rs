use super::{ImageMetadata, Policy, Rule, RuleSeverity, builtin_policy};
use crate::config::Config;
use crate::expr::{Context, ErrorKind, EvalError, Evaluator, Value};
use crate::failure_policy::{FailureOutcome, FailurePolicy};
use serde::Serialize;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "    policy";

/// A rule whose condition evaluated falsy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintViolation {
    pub rule: Rule,
    pub severity: RuleSeverity,
    pub message: String,
    pub location: String,
}

/// A rule whose condition could not be evaluated and was counted as passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationFailure {
    pub rule_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintResult {
    pub success: bool,
    pub image_reference: String,
    pub policy_name: String,
    pub policy_version: String,
    pub violations: Vec<LintViolation>,
    pub evaluation_failures: Vec<EvaluationFailure>,
    pub errors: Vec<String>,
}

impl LintResult {
    /// Whether the lint ran cleanly and found no error-severity violations.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.success && self.error_count() == 0
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(RuleSeverity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count(RuleSeverity::Warning)
    }

    #[must_use]
    pub fn info_count(&self) -> usize {
        self.count(RuleSeverity::Info)
    }

    fn count(&self, severity: RuleSeverity) -> usize {
        self.violations.iter().filter(|v| v.severity == severity).count()
    }

    /// Violations grouped by rule id.
    #[must_use]
    pub fn violations_by_rule(&self) -> BTreeMap<&str, Vec<&LintViolation>> {
        let mut grouped: BTreeMap<&str, Vec<&LintViolation>> = BTreeMap::new();
        for v in &self.violations {
            grouped.entry(v.rule.id.as_str()).or_default().push(v);
        }
        grouped
    }
}

/// Checks images against policy rules.
///
/// Conditions that fail to evaluate are handled according to the linter's
/// [`FailurePolicy`], which defaults to counting the rule as passed.
#[derive(Debug, Clone)]
pub struct PolicyLinter {
    evaluator: Evaluator,
    failures: FailurePolicy,
    builtin: Policy,
}

impl Default for PolicyLinter {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl PolicyLinter {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            evaluator: Evaluator::new().with_max_depth(config.max_depth),
            failures: config.policy_failures.clone(),
            builtin: builtin_policy(),
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, failures: FailurePolicy) -> Self {
        self.failures = failures;
        self
    }

    #[must_use]
    pub const fn failure_policy(&self) -> &FailurePolicy {
        &self.failures
    }

    /// Lints `image` against the built-in rules (when requested) followed by `policy`.
    #[must_use]
    pub fn lint(&self, image: &ImageMetadata, policy: Option<&Policy>, include_builtin: bool) -> LintResult {
        let (policy_name, policy_version) =
            policy.map_or_else(|| ("builtin".to_string(), "1.0.0".to_string()), |p| (p.name.clone(), p.version.clone()));

        let builtin_rules = include_builtin.then(|| self.builtin.enabled_rules()).into_iter().flatten();
        let policy_rules = policy.map(Policy::enabled_rules).into_iter().flatten();

        let context = image.context();
        let mut result = LintResult {
            success: true,
            image_reference: image.reference.clone(),
            policy_name,
            policy_version,
            violations: Vec::new(),
            evaluation_failures: Vec::new(),
            errors: Vec::new(),
        };

        for rule in builtin_rules.chain(policy_rules) {
            match self.evaluate_rule(rule, &context) {
                Ok(true) => {}
                Ok(false) => {
                    log::debug!(target: LOG_TARGET, "Rule {} failed for '{}'", rule.id, image.reference);
                    result.violations.push(LintViolation {
                        rule: rule.clone(),
                        severity: rule.severity,
                        message: rule.description.clone(),
                        location: image.reference.clone(),
                    });
                }
                Err(e) => self.record_failure(rule, image, &e, &mut result),
            }
        }

        result.success = result.errors.is_empty();
        result
    }

    fn evaluate_rule(&self, rule: &Rule, context: &Context) -> Result<bool, EvalError> {
        let value = if rule.params.is_empty() {
            self.evaluator.evaluate(&rule.condition, context)?
        } else {
            let params = serde_json::Value::Object(rule.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            let context = context.clone().with("params", Value::from(params));
            self.evaluator.evaluate(&rule.condition, &context)?
        };
        Ok(value.is_truthy())
    }

    fn record_failure(&self, rule: &Rule, image: &ImageMetadata, error: &EvalError, result: &mut LintResult) {
        match self.failures.outcome(error.kind()) {
            FailureOutcome::Pass => {
                log::warn!(target: LOG_TARGET, "Failed to evaluate rule {}: {error}", rule.id);
                result.evaluation_failures.push(EvaluationFailure {
                    rule_id: rule.id.clone(),
                    kind: error.kind(),
                    message: error.to_string(),
                });
            }
            FailureOutcome::Warn => {
                result.violations.push(LintViolation {
                    rule: rule.clone(),
                    severity: RuleSeverity::Warning,
                    message: format!("Rule evaluation failed: {error}"),
                    location: image.reference.clone(),
                });
            }
            FailureOutcome::Propagate => {
                log::error!(target: LOG_TARGET, "Failed to evaluate rule {}: {error}", rule.id);
                result.errors.push(format!("Failed to evaluate rule {}: {error}", rule.id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(user: &str, labels: serde_json::Value, env: &[&str]) -> ImageMetadata {
        let inspect = json!({
            "Id": "sha256:0123",
            "RepoTags": ["nvcr.io/nim/meta/llama3:1.0.0"],
            "Config": {
                "User": user,
                "Labels": labels,
                "Env": env,
                "ExposedPorts": {"8000/tcp": {}},
            }
        });
        ImageMetadata::from_inspect(&inspect, None).unwrap()
    }

    fn good_image() -> ImageMetadata {
        image(
            "nim",
            json!({"com.nvidia.nim.version": "1.0.0", "com.nvidia.nim.model.name": "llama3"}),
            &["PATH=/usr/bin"],
        )
    }

    #[test]
    fn test_clean_image_passes_builtins() {
        let result = PolicyLinter::default().lint(&good_image(), None, true);
        assert!(result.passed(), "{result:?}");
        assert!(result.violations.is_empty());
        assert_eq!(result.policy_name, "builtin");
    }

    #[test]
    fn test_builtin_violations() {
        let bad = image("root", json!({}), &["API_TOKEN=abc", "TOKEN=x"]);
        let result = PolicyLinter::default().lint(&bad, None, true);
        let ids: Vec<_> = result.violations.iter().map(|v| v.rule.id.as_str()).collect();
        assert_eq!(ids, vec!["nim-001", "nim-002", "nim-003", "nim-005"]);
        assert_eq!(result.error_count(), 3);
        assert_eq!(result.warning_count(), 1);
        assert!(!result.passed());
        assert!(result.success);
        assert_eq!(result.violations[0].message, "NIM images must have a version label");
        assert_eq!(result.violations[0].location, "nvcr.io/nim/meta/llama3:1.0.0");
    }

    #[test]
    fn test_policy_rules_follow_builtins() {
        let policy = Policy::new(
            "enterprise",
            vec![
                Rule::new("ent-1", "no-latest", "tag != 'latest'"),
                Rule::new("ent-2", "amd64", "architecture == 'amd64'").with_severity(RuleSeverity::Info),
                Rule::new("ent-3", "disabled", "False").with_enabled(false),
            ],
        );
        let result = PolicyLinter::default().lint(&good_image(), Some(&policy), false);
        assert_eq!(result.policy_name, "enterprise");
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule.id, "ent-2");
        assert_eq!(result.info_count(), 1);
        assert!(result.passed());
    }

    #[test]
    fn test_params_are_visible() {
        let policy = Policy::new(
            "p",
            vec![Rule::new("p-1", "arch", "architecture in params['allowed']").with_param("allowed", json!(["arm64"]))],
        );
        let result = PolicyLinter::default().lint(&good_image(), Some(&policy), false);
        assert_eq!(result.violations.len(), 1);
    }

    fn broken_policy() -> Policy {
        Policy::new("broken", vec![Rule::new("b-1", "broken", "undefined_name == 1").with_severity(RuleSeverity::Error)])
    }

    #[test]
    fn test_fail_open_by_default() {
        let result = PolicyLinter::default().lint(&good_image(), Some(&broken_policy()), false);
        assert!(result.passed());
        assert!(result.violations.is_empty());
        assert_eq!(result.evaluation_failures.len(), 1);
        assert_eq!(result.evaluation_failures[0].rule_id, "b-1");
        assert_eq!(result.evaluation_failures[0].kind, ErrorKind::UnknownVariable);
    }

    #[test]
    fn test_warn_outcome() {
        let linter = PolicyLinter::default().with_failure_policy(FailurePolicy::warn());
        let result = linter.lint(&good_image(), Some(&broken_policy()), false);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, RuleSeverity::Warning);
        assert_eq!(result.violations[0].message, "Rule evaluation failed: Unknown variable: undefined_name");
        assert!(result.passed());
    }

    #[test]
    fn test_propagate_override() {
        let linter = PolicyLinter::default()
            .with_failure_policy(FailurePolicy::fail_open().with_override(ErrorKind::UnknownVariable, FailureOutcome::Propagate));
        let result = linter.lint(&good_image(), Some(&broken_policy()), false);
        assert!(!result.success);
        assert!(!result.passed());
        assert_eq!(result.errors, vec!["Failed to evaluate rule b-1: Unknown variable: undefined_name"]);
    }

    #[test]
    fn test_syntax_errors_follow_policy() {
        let policy = Policy::new("p", vec![Rule::new("s-1", "bad", "labels[")]);
        let result = PolicyLinter::default().lint(&good_image(), Some(&policy), false);
        assert_eq!(result.evaluation_failures[0].kind, ErrorKind::Syntax);
    }

    #[test]
    fn test_violations_by_rule() {
        let policy = Policy::new("p", vec![Rule::new("x", "x", "False"), Rule::new("y", "y", "True")]);
        let result = PolicyLinter::default().lint(&good_image(), Some(&policy), false);
        let grouped = result.violations_by_rule();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["x"].len(), 1);
    }
}
