use crate::Result;
use crate::cel::DEFAULT_CEL_MAX_DEPTH;
use crate::expr::DEFAULT_MAX_DEPTH;
use crate::failure_policy::FailurePolicy;
use camino::{Utf8Path, Utf8PathBuf};
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

const LOG_TARGET: &str = "    config";

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../default_config.yml");

/// Highest nesting depth either evaluator may be configured with.
pub const MAX_CONFIGURABLE_DEPTH: usize = 64;

/// File names probed in the working directory when no `--config` is given.
const CONFIG_CANDIDATES: [&str; 4] = ["nim-audit.yml", "nim-audit.yaml", "nim-audit.toml", "nim-audit.json"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Nesting bound for policy rule conditions
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Nesting bound for CEL rule conditions
    #[serde(default = "default_cel_max_depth")]
    pub cel_max_depth: usize,

    /// Whether the built-in policy rules run alongside a policy file
    #[serde(default = "default_include_builtin_rules")]
    pub include_builtin_rules: bool,

    /// Handling of policy rules whose condition fails to evaluate
    #[serde(default = "FailurePolicy::fail_open")]
    pub policy_failures: FailurePolicy,

    /// Handling of environment CEL rules whose condition fails to evaluate
    #[serde(default = "FailurePolicy::warn")]
    pub env_rule_failures: FailurePolicy,
}

const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

const fn default_cel_max_depth() -> usize {
    DEFAULT_CEL_MAX_DEPTH
}

const fn default_include_builtin_rules() -> bool {
    true
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// With no explicit path, `nim-audit.{yml,yaml,toml,json}` is looked up in
    /// `base_dir`; when none exists the defaults are returned.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading nim-audit configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let mut found = None;
            for name in CONFIG_CANDIDATES {
                let path = base_dir.join(name);
                match fs::read_to_string(&path) {
                    Ok(text) => {
                        found = Some((path, text));
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_app_err_with(|| format!("reading nim-audit configuration file '{path}'")),
                }
            }

            let Some(result) = found else {
                log::debug!(target: LOG_TARGET, "No configuration file found in '{base_dir}', using defaults");
                return Ok(Self::default());
            };
            result
        };

        log::info!(target: LOG_TARGET, "Loading configuration from '{final_path}'");
        let config = Self::parse(&final_path, &text)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(path: &Utf8Path, text: &str) -> Result<Self> {
        let extension = path.extension().unwrap_or_default();
        let config = match extension {
            "toml" => toml::from_str(text).into_app_err_with(|| format!("parsing TOML configuration file '{path}'"))?,
            "json" => serde_json::from_str(text).into_app_err_with(|| format!("parsing JSON configuration file '{path}'"))?,
            "yml" | "yaml" | "" => {
                // an empty YAML document deserializes as null, not as an empty map
                if text.trim().is_empty() || text.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
                    Self::from_empty()
                } else {
                    serde_yaml::from_str(text).into_app_err_with(|| format!("parsing YAML configuration file '{path}'"))?
                }
            }
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };
        Ok(config)
    }

    /// Settings used when a configuration file is present but sets nothing.
    fn from_empty() -> Self {
        Self {
            max_depth: default_max_depth(),
            cel_max_depth: default_cel_max_depth(),
            include_builtin_rules: default_include_builtin_rules(),
            policy_failures: FailurePolicy::fail_open(),
            env_rule_failures: FailurePolicy::warn(),
        }
    }

    /// Save the default configuration, with its comments, to a file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_YAML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !(1..=MAX_CONFIGURABLE_DEPTH).contains(&self.max_depth) {
            return Err(app_err!(
                "max_depth must be between 1 and {MAX_CONFIGURABLE_DEPTH}, got {}",
                self.max_depth
            ));
        }

        if !(1..=MAX_CONFIGURABLE_DEPTH).contains(&self.cel_max_depth) {
            return Err(app_err!(
                "cel_max_depth must be between 1 and {MAX_CONFIGURABLE_DEPTH}, got {}",
                self.cel_max_depth
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_CONFIG_YAML).expect("default_config.yml should be valid YAML that deserializes to Config")
    }
}
