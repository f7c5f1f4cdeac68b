use super::model::{EnvLintResult, Finding, ImpactMetric, Severity};
use super::registry::Registry;
use super::rules::{CelRule, DslRule, EnvRules, RulesDocument};
use crate::Result;
use crate::cel::CelEvaluator;
use crate::config::Config;
use crate::expr::{Context, Value};
use crate::failure_policy::{FailureOutcome, FailurePolicy};
use ohno::IntoAppError;
use std::collections::{BTreeMap, BTreeSet};

const LOG_TARGET: &str = "       env";

/// The environment a container will see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSurface {
    /// Defaults baked into the image.
    pub image_env: BTreeMap<String, String>,

    /// Variables supplied by the operator, typically from an env file.
    pub overlay: BTreeMap<String, String>,

    /// Variable names found referenced inside the image.
    pub discovered: BTreeSet<String>,
}

impl EnvSurface {
    #[must_use]
    pub fn from_overlay(overlay: BTreeMap<String, String>) -> Self {
        Self {
            overlay,
            ..Self::default()
        }
    }

    /// The image environment with the overlay applied on top.
    #[must_use]
    pub fn effective(&self) -> BTreeMap<String, String> {
        let mut effective = self.image_env.clone();
        effective.extend(self.overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
        effective
    }
}

/// Lints an environment against the registry and a rules document.
#[derive(Debug, Clone)]
pub struct EnvLinter {
    cel: CelEvaluator,
    failures: FailurePolicy,
}

impl Default for EnvLinter {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl EnvLinter {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            cel: CelEvaluator::new(config.cel_max_depth),
            failures: config.env_rule_failures.clone(),
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, failures: FailurePolicy) -> Self {
        self.failures = failures;
        self
    }

    /// Runs the built-in checks followed by the document's rules.
    ///
    /// Fails only when the rules cannot be compiled or a CEL rule error is
    /// configured to propagate.
    pub fn lint(&self, surface: &EnvSurface, registry: &Registry, rules: &RulesDocument) -> Result<EnvLintResult> {
        let mut findings = unknown_keys(surface, registry);
        findings.extend(registry_heuristics(surface, registry));

        let effective = surface.effective();
        match rules.compile().into_app_err("compiling environment rules")? {
            EnvRules::Dsl(rules) => findings.extend(dsl_findings(&effective, &rules)),
            EnvRules::Cel(rules) => {
                let context = cel_context(surface, registry, effective);
                for rule in &rules {
                    if let Some(finding) = self.cel_finding(rule, &context)? {
                        findings.push(finding);
                    }
                }
            }
        }

        let result = EnvLintResult::from_findings(findings);
        log::info!(
            target: LOG_TARGET,
            "Environment lint finished with {}: {} fail, {} warn, {} info",
            result.overall,
            result.counts.fail,
            result.counts.warn,
            result.counts.info
        );
        Ok(result)
    }

    fn cel_finding(&self, rule: &CelRule, context: &Context) -> Result<Option<Finding>> {
        match self.cel.evaluate(&rule.when_cel, context) {
            Ok(true) => Ok(Some(Finding::new(&rule.id, rule.severity, &rule.message))),
            Ok(false) => Ok(None),
            Err(e) => match self.failures.outcome(e.kind()) {
                FailureOutcome::Warn => Ok(Some(Finding::new(&rule.id, Severity::Warn, format!("Rule evaluation error: {e}")))),
                FailureOutcome::Pass => {
                    log::warn!(target: LOG_TARGET, "Failed to evaluate rule {}: {e}", rule.id);
                    Ok(None)
                }
                FailureOutcome::Propagate => Err(e).into_app_err_with(|| format!("evaluating environment rule {}", rule.id)),
            },
        }
    }
}

fn unknown_keys(surface: &EnvSurface, registry: &Registry) -> Vec<Finding> {
    surface
        .overlay
        .keys()
        .filter(|k| !registry.contains(k) && !surface.discovered.contains(*k))
        .map(|k| {
            Finding::new("ENV-UNKNOWN", Severity::Warn, "Env var not recognized (not in registry and not discovered in image).")
                .for_env(k)
        })
        .collect()
}

fn registry_heuristics(surface: &EnvSurface, registry: &Registry) -> Vec<Finding> {
    let mut findings = Vec::new();
    for name in surface.overlay.keys() {
        let Some(entry) = registry.get(name) else {
            continue;
        };

        for affect in &entry.affects {
            let hit = match affect.metric {
                ImpactMetric::Determinism if affect.impact.is_decrease() => {
                    Some(("ENV-DETERMINISM", "Registry marks this as reducing determinism."))
                }
                ImpactMetric::Memory if affect.impact.is_increase() => {
                    Some(("ENV-MEMORY", "Registry marks this as increasing memory usage."))
                }
                ImpactMetric::Compatibility if affect.impact.is_decrease() => {
                    Some(("ENV-COMPAT", "Registry marks this as reducing compatibility across GPUs/drivers."))
                }
                _ => None,
            };

            if let Some((id, message)) = hit {
                findings.push(Finding::new(id, Severity::Warn, message).for_env(name));
            }
        }
    }
    findings
}

fn dsl_findings(effective: &BTreeMap<String, String>, rules: &[DslRule]) -> Vec<Finding> {
    rules
        .iter()
        .filter(|rule| rule.when.holds(effective))
        .filter_map(|rule| {
            rule.then
                .as_ref()
                .map(|(severity, message)| Finding::new(&rule.id, *severity, message))
        })
        .collect()
}

fn cel_context(surface: &EnvSurface, registry: &Registry, effective: BTreeMap<String, String>) -> Context {
    let known_vars: BTreeSet<&str> = surface
        .discovered
        .iter()
        .map(String::as_str)
        .chain(registry.entries.keys().map(String::as_str))
        .collect();
    let known_vars: Vec<Value> = known_vars.into_iter().map(Value::from).collect();

    let meta: BTreeMap<String, Value> = [("known_vars".to_string(), Value::from(known_vars))].into_iter().collect();

    Context::new()
        .with("env", effective)
        .with("overlay", surface.overlay.clone())
        .with("meta", meta)
}
