use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// How serious a rule violation is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Error,
    #[default]
    Warning,
    Info,
}

/// A single policy rule.
///
/// The rule passes when `condition` evaluates truthy against the image context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub severity: RuleSeverity,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub condition: String,

    /// Values exposed to the condition as `params`.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub rationale: Option<String>,

    #[serde(default)]
    pub remediation: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

const fn default_enabled() -> bool {
    true
}

impl Rule {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            severity: RuleSeverity::default(),
            category: default_category(),
            enabled: true,
            condition: condition.into(),
            params: BTreeMap::new(),
            rationale: None,
            remediation: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn with_severity(mut self, severity: RuleSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        _ = self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    #[must_use]
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}
