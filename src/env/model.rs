use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Severity of an environment lint finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Fail,
}

/// Metrics an environment variable can influence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImpactMetric {
    Latency,
    Throughput,
    Memory,
    Determinism,
    Numerics,
    Compatibility,
}

/// Direction and strength of an effect on a metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ImpactLevel {
    #[strum(serialize = "++")]
    #[serde(rename = "++")]
    StrongPositive,

    #[strum(serialize = "+")]
    #[serde(rename = "+")]
    Positive,

    #[strum(serialize = "±")]
    #[serde(rename = "±")]
    Neutral,

    #[strum(serialize = "-")]
    #[serde(rename = "-")]
    Negative,

    #[strum(serialize = "--")]
    #[serde(rename = "--")]
    StrongNegative,

    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
}

impl ImpactLevel {
    #[must_use]
    pub const fn is_increase(self) -> bool {
        matches!(self, Self::Positive | Self::StrongPositive)
    }

    #[must_use]
    pub const fn is_decrease(self) -> bool {
        matches!(self, Self::Negative | Self::StrongNegative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Affect {
    pub metric: ImpactMetric,
    pub impact: ImpactLevel,
}

/// How much the registry trusts an entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Med,
    #[default]
    Low,
}

/// A known environment variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: Option<String>,
    pub scope: Option<String>,
    pub precedence: Option<String>,
    pub default: Option<String>,
    pub affects: Vec<Affect>,
    pub determinism: Option<String>,
    pub interactions: Vec<serde_json::Value>,
    pub failure_modes: Vec<String>,
    pub confidence: Confidence,
    pub evidence: Vec<serde_json::Value>,
}

/// A documented interaction between two variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEdge {
    pub var_a: String,
    pub var_b: String,
    pub interaction_type: String,
    pub description: String,
}

/// One side of an [`InteractionEdge`], seen from a given variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interaction<'a> {
    pub with: &'a str,
    #[serde(rename = "type")]
    pub interaction_type: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub env: Option<String>,
    pub message: String,
}

impl Finding {
    pub fn new(id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            env: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn for_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }
}

/// Overall verdict of an environment lint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Overall {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counts {
    pub info: usize,
    pub warn: usize,
    pub fail: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvLintResult {
    pub overall: Overall,
    pub findings: Vec<Finding>,
    pub counts: Counts,
}

impl EnvLintResult {
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let mut counts = Counts::default();
        for f in &findings {
            match f.severity {
                Severity::Info => counts.info += 1,
                Severity::Warn => counts.warn += 1,
                Severity::Fail => counts.fail += 1,
            }
        }

        let overall = if counts.fail > 0 {
            Overall::Fail
        } else if counts.warn > 0 {
            Overall::Warn
        } else {
            Overall::Pass
        };

        Self { overall, findings, counts }
    }

    /// Findings grouped by finding id.
    #[must_use]
    pub fn findings_by_id(&self) -> BTreeMap<&str, Vec<&Finding>> {
        let mut grouped: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
        for f in &self.findings {
            grouped.entry(f.id.as_str()).or_default().push(f);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impact_level_names() {
        assert_eq!("±".parse::<ImpactLevel>().unwrap(), ImpactLevel::Neutral);
        assert_eq!(ImpactLevel::StrongNegative.to_string(), "--");
        assert!("+++".parse::<ImpactLevel>().is_err());
        assert!(ImpactLevel::StrongPositive.is_increase());
        assert!(!ImpactLevel::None.is_decrease());
    }

    #[test]
    fn test_severity_names() {
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!(Severity::Fail.to_string(), "FAIL");
        assert!("warn".parse::<Severity>().is_err());
    }

    #[test]
    fn test_overall() {
        let result = EnvLintResult::from_findings(vec![]);
        assert_eq!(result.overall, Overall::Pass);

        let result = EnvLintResult::from_findings(vec![
            Finding::new("A", Severity::Info, "a"),
            Finding::new("B", Severity::Warn, "b").for_env("X"),
            Finding::new("B", Severity::Warn, "c"),
        ]);
        assert_eq!(result.overall, Overall::Warn);
        assert_eq!(result.counts, Counts { info: 1, warn: 2, fail: 0 });
        assert_eq!(result.findings_by_id()["B"].len(), 2);

        let result = EnvLintResult::from_findings(vec![Finding::new("F", Severity::Fail, "f")]);
        assert_eq!(result.overall, Overall::Fail);
    }
}
