//! Loader for the environment variable registry and its interaction graph.
//!
//! Registry documents are hand-maintained, so loading is lenient: malformed
//! entries are skipped or normalized and a warning is recorded instead of
//! failing the whole load.

use super::model::{Affect, Confidence, ImpactLevel, ImpactMetric, Interaction, InteractionEdge, RegistryEntry};
use crate::Result;
use camino::Utf8Path;
use ohno::IntoAppError;
use serde_yaml::Value as Yaml;
use std::collections::BTreeMap;
use std::fs;

const LOG_TARGET: &str = "  registry";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub entries: BTreeMap<String, RegistryEntry>,
    pub interactions: Vec<InteractionEdge>,
    pub warnings: Vec<String>,
}

impl Registry {
    /// Loads a registry file and an optional interactions file.
    pub fn load(registry_path: Option<&Utf8Path>, interactions_path: Option<&Utf8Path>) -> Result<Self> {
        let registry = read_optional(registry_path, "registry")?;
        let interactions = read_optional(interactions_path, "interactions")?;
        let registry = Self::from_yaml(registry.as_deref(), interactions.as_deref())
            .into_app_err("parsing environment registry")?;

        for warning in &registry.warnings {
            log::warn!(target: LOG_TARGET, "{warning}");
        }
        Ok(registry)
    }

    /// Builds a registry from the text of the registry and interactions documents.
    pub fn from_yaml(registry: Option<&str>, interactions: Option<&str>) -> Result<Self, serde_yaml::Error> {
        let mut out = Self::default();

        if let Some(text) = registry {
            let raw = parse_document(text)?;
            out.parse_entries(&raw);
        }

        if let Some(text) = interactions {
            let raw = parse_document(text)?;
            out.parse_edges(&raw);
        }

        Ok(out)
    }

    fn parse_entries(&mut self, raw: &Yaml) {
        let items = match raw {
            Yaml::Mapping(m) => m.get("vars").cloned().unwrap_or(Yaml::Null),
            other => other.clone(),
        };

        let items = match items {
            Yaml::Null => Vec::new(),
            Yaml::Sequence(items) => items,
            _ => {
                self.warnings.push("registry: expected top-level 'vars' list".to_string());
                Vec::new()
            }
        };

        for item in items {
            let Yaml::Mapping(item) = item else {
                continue;
            };
            let Some(name) = item.get("name").and_then(scalar_string) else {
                continue;
            };
            let name = name.trim().to_string();

            let affects = self.normalize_affects(item.get("affects"), &name);

            let confidence_text = item
                .get("confidence")
                .and_then(scalar_string)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "LOW".to_string())
                .to_uppercase();
            let confidence = confidence_text.parse::<Confidence>().unwrap_or_else(|_| {
                self.warnings.push(format!("{name}: confidence '{confidence_text}' not in HIGH|MED|LOW"));
                Confidence::Low
            });

            let entry = RegistryEntry {
                name: name.clone(),
                value_type: item.get("type").and_then(scalar_string),
                scope: item.get("scope").and_then(scalar_string),
                precedence: item.get("precedence").and_then(scalar_string),
                default: item.get("default").and_then(scalar_string),
                affects,
                determinism: item.get("determinism").and_then(scalar_string),
                interactions: json_list(item.get("interactions")),
                failure_modes: match item.get("failure_modes") {
                    Some(Yaml::Sequence(modes)) => modes.iter().filter_map(scalar_string).collect(),
                    _ => Vec::new(),
                },
                confidence,
                evidence: json_list(item.get("evidence")),
            };

            _ = self.entries.insert(name, entry);
        }
    }

    fn parse_edges(&mut self, raw: &Yaml) {
        let items = match raw {
            Yaml::Mapping(m) => m.get("edges").cloned().unwrap_or(Yaml::Null),
            other => other.clone(),
        };

        let items = match items {
            Yaml::Null => return,
            Yaml::Sequence(items) => items,
            _ => {
                self.warnings.push("interactions: expected top-level 'edges' list".to_string());
                return;
            }
        };

        for item in items {
            let Yaml::Mapping(item) = item else {
                continue;
            };
            let field = |key: &str| item.get(key).and_then(scalar_string);
            if let (Some(var_a), Some(var_b), Some(interaction_type), Some(description)) =
                (field("var_a"), field("var_b"), field("interaction_type"), field("description"))
            {
                self.interactions.push(InteractionEdge {
                    var_a,
                    var_b,
                    interaction_type,
                    description,
                });
            }
        }
    }

    fn normalize_affects(&mut self, raw: Option<&Yaml>, var: &str) -> Vec<Affect> {
        let items = match raw {
            None | Some(Yaml::Null) => return Vec::new(),
            Some(Yaml::Sequence(items)) => items,
            Some(_) => {
                self.warnings.push(format!("{var}: affects should be a list"));
                return Vec::new();
            }
        };

        let mut out: Vec<Affect> = Vec::new();
        for item in items {
            match self.parse_affect(item, var) {
                Some(affect) => {
                    if !out.contains(&affect) {
                        out.push(affect);
                    }
                }
                None => self.warnings.push(format!("{var}: invalid affects item {}", yaml_repr(item))),
            }
        }
        out
    }

    /// Accepts `"metric:impact"`, `{metric, impact}` and `{metric: impact}`.
    fn parse_affect(&mut self, item: &Yaml, var: &str) -> Option<Affect> {
        match item {
            Yaml::String(s) => {
                let (metric, impact) = s.split_once(':')?;
                let metric_text = metric.trim().to_lowercase();
                let impact_text = impact.trim();

                // a string form with unknown parts is kept, with the unknown part defaulted
                let metric = metric_text.parse().unwrap_or_else(|_| {
                    self.warnings.push(format!("{var}: affects.metric '{metric_text}' is not a known metric"));
                    ImpactMetric::Latency
                });
                let impact = impact_text.parse().unwrap_or_else(|_| {
                    self.warnings.push(format!("{var}: affects.impact '{impact_text}' is not a known impact"));
                    ImpactLevel::None
                });
                Some(Affect { metric, impact })
            }
            Yaml::Mapping(m) => {
                if let (Some(metric), Some(impact)) = (m.get("metric"), m.get("impact")) {
                    return strict_affect(metric, impact);
                }
                if m.len() == 1 {
                    let (metric, impact) = m.iter().next()?;
                    return strict_affect(metric, impact);
                }
                None
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Every documented interaction involving `var`.
    #[must_use]
    pub fn interactions_for(&self, var: &str) -> Vec<Interaction<'_>> {
        self.interactions
            .iter()
            .filter(|e| e.var_a == var || e.var_b == var)
            .map(|e| Interaction {
                with: if e.var_a == var { &e.var_b } else { &e.var_a },
                interaction_type: &e.interaction_type,
                description: &e.description,
            })
            .collect()
    }
}

fn read_optional(path: Option<&Utf8Path>, what: &str) -> Result<Option<String>> {
    path.map(|p| fs::read_to_string(p).into_app_err_with(|| format!("reading {what} file '{p}'")))
        .transpose()
}

fn parse_document(text: &str) -> Result<Yaml, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Yaml::Null);
    }
    serde_yaml::from_str(text)
}

fn strict_affect(metric: &Yaml, impact: &Yaml) -> Option<Affect> {
    let metric = scalar_string(metric)?.to_lowercase().parse().ok()?;
    let impact = scalar_string(impact)?.parse().ok()?;
    Some(Affect { metric, impact })
}

/// String form of a YAML scalar; `None` for null and collections.
pub(crate) fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(true) => Some("True".to_string()),
        Yaml::Bool(false) => Some("False".to_string()),
        Yaml::Tagged(tagged) => scalar_string(&tagged.value),
        Yaml::Null | Yaml::Sequence(_) | Yaml::Mapping(_) => None,
    }
}

fn json_list(value: Option<&Yaml>) -> Vec<serde_json::Value> {
    match value {
        Some(Yaml::Sequence(items)) => items.iter().filter_map(|v| serde_json::to_value(v).ok()).collect(),
        _ => Vec::new(),
    }
}

fn yaml_repr(value: &Yaml) -> String {
    match value {
        Yaml::String(s) => format!("'{s}'"),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r"
vars:
  - name: NIM_MAX_BATCH_SIZE
    type: int
    default: 64
    affects: ['throughput:++', 'memory:+', {metric: latency, impact: '-'}, 'memory:+']
    confidence: high
  - name: NIM_SEED
    affects:
      - determinism: '++'
    confidence: maybe
  - name: CUDA_ARCH_OVERRIDE
    affects: ['compatibility:--', 'speed:+', 'bogus', {metric: latency, impact: huge}]
    failure_modes: [crash, 3]
  - name: NIM_BROKEN
    affects: latency
  - no_name: true
  - just a string
";

    const INTERACTIONS: &str = r"
edges:
  - {var_a: NIM_MAX_BATCH_SIZE, var_b: NIM_KV_CACHE, interaction_type: competes, description: Both consume GPU memory}
  - {var_a: NIM_SEED, var_b: NIM_MAX_BATCH_SIZE, interaction_type: weakens, description: Batching reorders work}
  - {var_a: incomplete}
";

    #[test]
    fn test_entries() {
        let reg = Registry::from_yaml(Some(REGISTRY), None).unwrap();
        assert_eq!(reg.entries.len(), 4);

        let batch = reg.get("NIM_MAX_BATCH_SIZE").unwrap();
        assert_eq!(batch.value_type.as_deref(), Some("int"));
        assert_eq!(batch.default.as_deref(), Some("64"));
        assert_eq!(batch.confidence, Confidence::High);
        assert_eq!(
            batch.affects,
            vec![
                Affect { metric: ImpactMetric::Throughput, impact: ImpactLevel::StrongPositive },
                Affect { metric: ImpactMetric::Memory, impact: ImpactLevel::Positive },
                Affect { metric: ImpactMetric::Latency, impact: ImpactLevel::Negative },
            ]
        );

        let seed = reg.get("NIM_SEED").unwrap();
        assert_eq!(seed.confidence, Confidence::Low);
        assert_eq!(seed.affects[0].metric, ImpactMetric::Determinism);

        let arch = reg.get("CUDA_ARCH_OVERRIDE").unwrap();
        assert_eq!(arch.failure_modes, vec!["crash", "3"]);
        assert_eq!(arch.affects.len(), 2);
        assert_eq!(arch.affects[1], Affect { metric: ImpactMetric::Latency, impact: ImpactLevel::Positive });

        assert!(reg.get("NIM_BROKEN").unwrap().affects.is_empty());
    }

    #[test]
    fn test_warnings() {
        let reg = Registry::from_yaml(Some(REGISTRY), None).unwrap();
        assert_eq!(
            reg.warnings,
            vec![
                "NIM_SEED: confidence 'MAYBE' not in HIGH|MED|LOW",
                "CUDA_ARCH_OVERRIDE: affects.metric 'speed' is not a known metric",
                "CUDA_ARCH_OVERRIDE: invalid affects item 'bogus'",
                r#"CUDA_ARCH_OVERRIDE: invalid affects item {"metric":"latency","impact":"huge"}"#,
                "NIM_BROKEN: affects should be a list",
            ]
        );
    }

    #[test]
    fn test_bare_list_and_bad_shapes() {
        let reg = Registry::from_yaml(Some("- name: A\n- name: B\n"), None).unwrap();
        assert_eq!(reg.entries.len(), 2);

        let reg = Registry::from_yaml(Some("vars: 3\n"), Some("edges: {}\n")).unwrap();
        assert!(reg.entries.is_empty());
        assert_eq!(
            reg.warnings,
            vec!["registry: expected top-level 'vars' list", "interactions: expected top-level 'edges' list"]
        );

        let reg = Registry::from_yaml(Some(""), Some("")).unwrap();
        assert_eq!(reg, Registry::default());

        assert!(Registry::from_yaml(Some("vars: [unclosed"), None).is_err());
    }

    #[test]
    fn test_interactions_for() {
        let reg = Registry::from_yaml(None, Some(INTERACTIONS)).unwrap();
        assert_eq!(reg.interactions.len(), 2);

        let found = reg.interactions_for("NIM_MAX_BATCH_SIZE");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].with, "NIM_KV_CACHE");
        assert_eq!(found[0].interaction_type, "competes");
        assert_eq!(found[1].with, "NIM_SEED");
        assert!(reg.interactions_for("OTHER").is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let registry = dir.join("registry.yaml");
        fs::write(&registry, REGISTRY).unwrap();

        let reg = Registry::load(Some(&registry), None).unwrap();
        assert!(reg.contains("NIM_SEED"));
        assert!(Registry::load(Some(&dir.join("missing.yaml")), None).is_err());
        assert_eq!(Registry::load(None, None).unwrap(), Registry::default());
    }
}
