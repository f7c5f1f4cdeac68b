//! What a rule engine does when a rule's condition cannot be evaluated.

use crate::expr::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Outcome applied to a rule whose condition failed to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureOutcome {
    /// Treat the rule as satisfied and log a warning.
    Pass,

    /// Report the failure as a warning-level finding.
    Warn,

    /// Abort the run with the error.
    Propagate,
}

/// Maps error kinds to outcomes, with a fallback for unlisted kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailurePolicy {
    pub default: FailureOutcome,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<ErrorKind, FailureOutcome>,
}

impl FailurePolicy {
    #[must_use]
    pub const fn new(default: FailureOutcome) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    /// Fail-open: every failure counts as a pass.
    #[must_use]
    pub const fn fail_open() -> Self {
        Self::new(FailureOutcome::Pass)
    }

    #[must_use]
    pub const fn warn() -> Self {
        Self::new(FailureOutcome::Warn)
    }

    #[must_use]
    pub fn with_override(mut self, kind: ErrorKind, outcome: FailureOutcome) -> Self {
        _ = self.overrides.insert(kind, outcome);
        self
    }

    #[must_use]
    pub fn outcome(&self, kind: ErrorKind) -> FailureOutcome {
        self.overrides.get(&kind).copied().unwrap_or(self.default)
    }
}
