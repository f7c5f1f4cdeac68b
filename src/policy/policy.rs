use super::{Rule, RuleSeverity};
use crate::Result;
use camino::Utf8Path;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs;

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_name() -> String {
    "custom".to_string()
}

/// A named collection of rules loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Names of parent policies. Recorded but not resolved.
    #[serde(default)]
    pub extends: Vec<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl Policy {
    #[must_use]
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            rules,
            extends: Vec::new(),
            author: None,
            tags: Vec::new(),
        }
    }

    /// Load a policy from a YAML file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading policy file '{path}'"))?;
        Self::from_yaml(&text).into_app_err_with(|| format!("parsing policy file '{path}'"))
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Save the policy as YAML
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        let text = serde_yaml::to_string(self).into_app_err("serializing policy")?;
        fs::write(path, text).into_app_err_with(|| format!("writing policy file '{path}'"))?;
        Ok(())
    }

    #[must_use]
    pub fn get_rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Enabled rules of the given severity.
    pub fn rules_by_severity(&self, severity: RuleSeverity) -> impl Iterator<Item = &Rule> {
        self.enabled_rules().filter(move |r| r.severity == severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    const POLICY: &str = r"
name: enterprise
description: Enterprise rules
tags: [prod]
rules:
  - id: ent-001
    name: pinned-tag
    condition: tag != 'latest'
    severity: error
  - id: ent-002
    name: has-quantization
    condition: quantization is not None
    enabled: false
  - id: ent-003
    name: arch
    condition: architecture == 'amd64'
";

    #[test]
    fn test_from_yaml() {
        let policy = Policy::from_yaml(POLICY).unwrap();
        assert_eq!(policy.name, "enterprise");
        assert_eq!(policy.version, "1.0.0");
        assert_eq!(policy.tags, vec!["prod"]);
        assert_eq!(policy.rules.len(), 3);
        assert_eq!(policy.enabled_rules().count(), 2);
        assert_eq!(policy.get_rule("ent-003").map(|r| r.name.as_str()), Some("arch"));
        assert!(policy.get_rule("missing").is_none());

        let errors: Vec<_> = policy.rules_by_severity(RuleSeverity::Error).map(|r| r.id.as_str()).collect();
        assert_eq!(errors, vec!["ent-001"]);
        let warnings: Vec<_> = policy.rules_by_severity(RuleSeverity::Warning).map(|r| r.id.as_str()).collect();
        assert_eq!(warnings, vec!["ent-003"]);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let policy = Policy::from_yaml("{}").unwrap();
        assert_eq!(policy.name, "custom");
        assert!(policy.rules.is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("policy.yml")).unwrap();
        let policy = Policy::from_yaml(POLICY).unwrap();
        policy.save(&path).unwrap();
        assert_eq!(Policy::load(&path).unwrap(), policy);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Policy::load(Utf8Path::new("/definitely/not/here.yml")).is_err());
    }
}
