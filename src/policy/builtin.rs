//! Rules that apply to every NIM image unless disabled.

use super::{Policy, Rule, RuleSeverity};

/// Returns the built-in rule set as a policy named `builtin`.
#[must_use]
pub fn builtin_policy() -> Policy {
    let mut policy = Policy::new("builtin", builtin_rules());
    policy.description = "Built-in enterprise rules for NIM images".to_string();
    policy
}

#[must_use]
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "nim-001",
            "require-version-label",
            "labels.get('com.nvidia.nim.version') is not None",
        )
        .with_description("NIM images must have a version label")
        .with_severity(RuleSeverity::Error)
        .with_category("metadata")
        .with_rationale("Version tracking is essential for auditing and rollback")
        .with_remediation("Add com.nvidia.nim.version label to image"),
        Rule::new(
            "nim-002",
            "no-root-user",
            "config.get('User', 'root') != 'root' and config.get('User', '') != ''",
        )
        .with_description("Container should not run as root")
        .with_severity(RuleSeverity::Warning)
        .with_category("security")
        .with_rationale("Running as root poses security risks")
        .with_remediation("Set a non-root user in the Dockerfile"),
        Rule::new(
            "nim-003",
            "require-model-name",
            "labels.get('com.nvidia.nim.model.name') is not None",
        )
        .with_description("NIM images must specify the model name")
        .with_severity(RuleSeverity::Error)
        .with_category("metadata")
        .with_rationale("Model name is required for inventory and tracking")
        .with_remediation("Add com.nvidia.nim.model.name label to image"),
        Rule::new("nim-004", "check-exposed-ports", "8000 in exposed_ports or 80 in exposed_ports")
            .with_description("NIM should expose the standard API port")
            .with_severity(RuleSeverity::Warning)
            .with_category("configuration")
            .with_rationale("Standard ports ensure consistency across deployments")
            .with_remediation("Expose port 8000 for the NIM API"),
        Rule::new(
            "nim-005",
            "no-sensitive-env",
            "not any(k in ['PASSWORD', 'SECRET', 'TOKEN', 'KEY'] for k in env.keys())",
        )
        .with_description("No sensitive values in default environment")
        .with_severity(RuleSeverity::Error)
        .with_category("security")
        .with_rationale("Sensitive values should not be baked into images")
        .with_remediation("Remove sensitive environment variables from image"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;

    #[test]
    fn test_builtin_ids() {
        let ids: Vec<_> = builtin_rules().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["nim-001", "nim-002", "nim-003", "nim-004", "nim-005"]);
    }

    #[test]
    fn test_builtin_conditions_parse() {
        for rule in builtin_rules() {
            assert!(Expression::parse(&rule.condition).is_ok(), "{} does not parse", rule.id);
        }
    }

    #[test]
    fn test_builtin_policy() {
        let policy = builtin_policy();
        assert_eq!(policy.name, "builtin");
        assert_eq!(policy.enabled_rules().count(), 5);
        assert_eq!(policy.rules_by_severity(RuleSeverity::Error).count(), 3);
    }
}
