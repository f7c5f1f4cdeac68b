//! Environment variable linting.
//!
//! An [`EnvSurface`] (image defaults, an operator overlay and the names
//! discovered inside the image) is checked against a [`Registry`] of known
//! variables and a [`RulesDocument`]. Rule documents either use the YAML
//! condition DSL or CEL conditions; CEL rules that fail to evaluate are
//! reported as warnings by default.

mod envfile;
mod linter;
mod model;
mod registry;
mod rules;

pub use envfile::{load_discovered, load_env_file, parse_discovered, parse_env_file};
pub use linter::{EnvLinter, EnvSurface};
pub use model::{
    Affect, Confidence, Counts, EnvLintResult, Finding, ImpactLevel, ImpactMetric, Interaction, InteractionEdge, Overall,
    RegistryEntry, Severity,
};
pub use registry::Registry;
pub use rules::{CelRule, Condition, DEFAULT_SCHEMA_VERSION, DslRule, EnvRules, EnvTest, RuleError, RulesDocument};
