//! Environment rule documents.
//!
//! Two rule dialects exist. Version 1 rules use a small YAML condition DSL:
//!
//! ```yaml
//! schema_version: nim-audit/env-rules/v1
//! rules:
//!   - id: TP-REQUIRES-NCCL
//!     when:
//!       all:
//!         - { env: NIM_TENSOR_PARALLEL_SIZE, matches: '^[2-9]' }
//!         - { env: NCCL_P2P_DISABLE, not_set: true }
//!     then: { warn: "Tensor parallelism without NCCL tuning" }
//! ```
//!
//! Version 2 rules carry a CEL condition in `when_cel` and are selected when
//! the schema ends in `/v2` or any rule uses `when_cel`.

use super::model::Severity;
use super::registry::scalar_string;
use crate::Result;
use camino::Utf8Path;
use ohno::IntoAppError;
use regex::Regex;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::BTreeMap;
use std::fs;

pub const DEFAULT_SCHEMA_VERSION: &str = "nim-audit/env-rules/v1";

const DEFAULT_RULE_ID: &str = "RULE";

/// A rules file as written, before its rules are compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct RulesDocument {
    pub schema_version: String,
    pub rules: Vec<Mapping>,
}

impl Default for RulesDocument {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule {rule}: invalid regex '{pattern}': {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl RulesDocument {
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading rules file '{path}'"))?;
        Self::from_yaml(&text).into_app_err_with(|| format!("parsing rules file '{path}'"))
    }

    /// Parses a rules document.
    ///
    /// Accepts a mapping with `schema_version` and `rules`, a bare list of
    /// rules, or a single rule mapping. Entries that are not mappings are dropped.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: Yaml = serde_yaml::from_str(text)?;
        let doc = match raw {
            Yaml::Sequence(items) => Self {
                rules: mappings(items),
                ..Self::default()
            },
            Yaml::Mapping(m) => {
                let schema_version = m
                    .get("schema_version")
                    .and_then(scalar_string)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_SCHEMA_VERSION.to_string());

                let rules = match m.get("rules") {
                    Some(Yaml::Sequence(items)) => mappings(items.clone()),
                    None if ["when", "then", "id"].iter().any(|k| m.contains_key(*k)) => vec![m.clone()],
                    _ => Vec::new(),
                };

                Self { schema_version, rules }
            }
            _ => Self::default(),
        };

        Ok(doc)
    }

    /// Whether the rules are CEL rules rather than DSL rules.
    #[must_use]
    pub fn is_cel(&self) -> bool {
        self.schema_version.ends_with("/v2") || self.rules.iter().any(|r| r.contains_key("when_cel"))
    }

    /// Turns the raw rules into evaluable form.
    pub fn compile(&self) -> Result<EnvRules, RuleError> {
        if self.is_cel() {
            return Ok(EnvRules::Cel(self.rules.iter().filter_map(CelRule::from_mapping).collect()));
        }

        let mut rules = Vec::with_capacity(self.rules.len());
        for raw in &self.rules {
            if let Some(rule) = DslRule::from_mapping(raw)? {
                rules.push(rule);
            }
        }
        Ok(EnvRules::Dsl(rules))
    }
}

fn mappings(items: Vec<Yaml>) -> Vec<Mapping> {
    items
        .into_iter()
        .filter_map(|v| match v {
            Yaml::Mapping(m) => Some(m),
            _ => None,
        })
        .collect()
}

fn rule_id(raw: &Mapping) -> String {
    raw.get("id")
        .and_then(scalar_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_RULE_ID.to_string())
}

#[derive(Debug, Clone)]
pub enum EnvRules {
    Dsl(Vec<DslRule>),
    Cel(Vec<CelRule>),
}

impl EnvRules {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dsl(rules) => rules.len(),
            Self::Cel(rules) => rules.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A version 1 rule.
#[derive(Debug, Clone)]
pub struct DslRule {
    pub id: String,
    pub when: Condition,
    pub then: Option<(Severity, String)>,
}

impl DslRule {
    fn from_mapping(raw: &Mapping) -> Result<Option<Self>, RuleError> {
        let id = rule_id(raw);

        let when = match raw.get("when") {
            None | Some(Yaml::Null) => Condition::Never,
            Some(Yaml::Mapping(when)) => Condition::parse(when, &id)?,
            Some(_) => return Ok(None),
        };

        let then = match raw.get("then") {
            Some(Yaml::Mapping(then)) => [(Severity::Fail, "fail"), (Severity::Warn, "warn"), (Severity::Info, "info")]
                .into_iter()
                .find_map(|(severity, key)| then.get(key).map(|msg| (severity, scalar_string(msg).unwrap_or_default()))),
            None | Some(Yaml::Null) => None,
            Some(_) => return Ok(None),
        };

        Ok(Some(Self { id, when, then }))
    }
}

/// A `when` clause of a version 1 rule.
#[derive(Debug, Clone)]
pub enum Condition {
    Any(Vec<Self>),
    All(Vec<Self>),
    Env { name: String, test: EnvTest },

    /// A clause that can never hold, such as one without an `env` key.
    Never,
}

#[derive(Debug, Clone)]
pub enum EnvTest {
    Set,
    NotSet,
    Equals(String),
    NotEquals(String),
    Matches(Regex),
    Never,
}

impl Condition {
    fn parse(when: &Mapping, rule: &str) -> Result<Self, RuleError> {
        for (key, ctor) in [("any", Self::Any as fn(Vec<Self>) -> Self), ("all", Self::All)] {
            if let Some(items) = when.get(key) {
                let items = match items {
                    Yaml::Sequence(items) => items
                        .iter()
                        .map(|item| match item {
                            Yaml::Mapping(m) => Self::parse(m, rule),
                            _ => Ok(Self::Never),
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => Vec::new(),
                };
                return Ok(ctor(items));
            }
        }

        let Some(name) = when.get("env").and_then(scalar_string).filter(|s| !s.is_empty()) else {
            return Ok(Self::Never);
        };

        let test = if when.get("set") == Some(&Yaml::Bool(true)) {
            EnvTest::Set
        } else if when.get("not_set") == Some(&Yaml::Bool(true)) {
            EnvTest::NotSet
        } else if let Some(v) = when.get("equals") {
            EnvTest::Equals(scalar_string(v).unwrap_or_default())
        } else if let Some(v) = when.get("not_equals") {
            EnvTest::NotEquals(scalar_string(v).unwrap_or_default())
        } else if let Some(v) = when.get("matches") {
            let pattern = scalar_string(v).unwrap_or_default();
            let regex = Regex::new(&pattern).map_err(|source| RuleError::InvalidPattern {
                rule: rule.to_string(),
                pattern: pattern.clone(),
                source,
            })?;
            EnvTest::Matches(regex)
        } else {
            EnvTest::Never
        };

        Ok(Self::Env { name, test })
    }

    /// Evaluates the clause against the effective environment.
    #[must_use]
    pub fn holds(&self, env: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Any(items) => items.iter().any(|c| c.holds(env)),
            Self::All(items) => items.iter().all(|c| c.holds(env)),
            Self::Never => false,
            Self::Env { name, test } => {
                let value = env.get(name);
                match test {
                    EnvTest::Set => value.is_some(),
                    EnvTest::NotSet => value.is_none(),
                    EnvTest::Equals(expected) => value.is_some_and(|v| v == expected),
                    EnvTest::NotEquals(expected) => value.is_some_and(|v| v != expected),
                    EnvTest::Matches(regex) => value.is_some_and(|v| regex.is_match(v)),
                    EnvTest::Never => false,
                }
            }
        }
    }
}

/// A version 2 rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelRule {
    pub id: String,
    pub severity: Severity,
    pub when_cel: String,
    pub message: String,
}

impl CelRule {
    fn from_mapping(raw: &Mapping) -> Option<Self> {
        let Some(Yaml::String(when_cel)) = raw.get("when_cel") else {
            return None;
        };

        let severity = raw
            .get("severity")
            .and_then(scalar_string)
            .and_then(|s| s.to_uppercase().parse().ok())
            .unwrap_or(Severity::Warn);

        Some(Self {
            id: rule_id(raw),
            severity,
            when_cel: when_cel.clone(),
            message: raw.get("message").and_then(scalar_string).unwrap_or_default(),
        })
    }
}
