use super::Host;
use crate::Result;
use crate::cel::translate;
use crate::config::Config;
use crate::env::{EnvRules, RulesDocument};
use crate::expr::Expression;
use crate::policy::Policy;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Policy file whose rule conditions are checked
    #[arg(long, value_name = "PATH")]
    pub policy: Option<Utf8PathBuf>,

    /// Environment rules document whose conditions are checked
    #[arg(long, value_name = "PATH")]
    pub rules: Option<Utf8PathBuf>,
}

fn policy_problems(path: &Utf8Path) -> Result<(usize, Vec<String>)> {
    let policy = Policy::load(path)?;
    let problems = policy
        .rules
        .iter()
        .filter_map(|rule| Expression::parse(&rule.condition).err().map(|e| format!("policy rule {}: {e}", rule.id)))
        .collect();
    Ok((policy.rules.len(), problems))
}

fn rules_problems(path: &Utf8Path) -> Result<(usize, Vec<String>)> {
    let document = RulesDocument::load(path)?;
    let rules = document.compile().into_app_err_with(|| format!("compiling environment rules '{path}'"))?;

    let mut problems = Vec::new();
    if let EnvRules::Cel(rules) = &rules {
        for rule in rules {
            let parsed = translate(&rule.when_cel)
                .map_err(|e| e.to_string())
                .and_then(|translated| Expression::parse(&translated).map_err(|e| e.to_string()));
            if let Err(e) = parsed {
                problems.push(format!("environment rule {}: {e}", rule.id));
            }
        }
    }
    Ok((rules.len(), problems))
}

/// Loads the configuration and parses every condition in the given documents
///
/// Returns one summary line per checked document.
fn validate_inner(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>, args: &ValidateArgs) -> Result<Vec<String>> {
    let _ = Config::load(base_dir, config_path)?;

    let mut summary = Vec::new();
    let mut problems = Vec::new();

    if let Some(path) = &args.policy {
        let (count, found) = policy_problems(path)?;
        summary.push(format!("Policy {path}: {count} rule(s)"));
        problems.extend(found);
    }

    if let Some(path) = &args.rules {
        let (count, found) = rules_problems(path)?;
        summary.push(format!("Environment rules {path}: {count} rule(s)"));
        problems.extend(found);
    }

    if !problems.is_empty() {
        bail!("{} invalid condition(s):\n  {}", problems.len(), problems.join("\n  "));
    }

    Ok(summary)
}

pub fn validate<H: Host>(host: &mut H, config_path: Option<&Utf8PathBuf>, args: &ValidateArgs) -> Result<()> {
    match validate_inner(Utf8Path::new("."), config_path, args) {
        Ok(summary) => {
            let _ = writeln!(host.output(), "Configuration is valid");
            if let Some(path) = config_path {
                let _ = writeln!(host.output(), "Config file: {path}");
            } else {
                let _ = writeln!(host.output(), "Using default configuration discovery");
            }
            for line in summary {
                let _ = writeln!(host.output(), "{line}");
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::host::TestHost;
    use crate::commands::init::{InitArgs, init_config};
    use std::fs;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    fn no_documents() -> ValidateArgs {
        ValidateArgs { policy: None, rules: None }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_default_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = temp_path(&dir, "nim-audit.yml");

        let mut init_host = TestHost::new();
        init_config(&mut init_host, &InitArgs { output: config_path.clone() }).unwrap();

        let mut host = TestHost::new();
        let result = validate(&mut host, Some(&config_path), &no_documents());

        assert!(result.is_ok(), "Default configuration should validate successfully: {result:?}");
        assert!(host.output_text().starts_with("Configuration is valid\n"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = temp_path(&dir, "nim-audit.yml");
        fs::write(&config_path, "max_depth: 10\nunknown_field: value\n").unwrap();

        let mut host = TestHost::new();
        let result = validate(&mut host, Some(&config_path), &no_documents());

        assert!(result.is_err(), "Unknown field should fail validation");
        assert!(host.error_text().starts_with("❌ Validation failed:"));
        assert_eq!(host.exit_code, Some(1));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_policy_with_bad_condition() {
        let dir = tempfile::tempdir().unwrap();
        let policy = temp_path(&dir, "policy.yml");
        fs::write(
            &policy,
            "name: corp\nrules:\n  - id: ok\n    name: ok\n    condition: tag != 'latest'\n  - id: broken\n    name: broken\n    condition: 'labels['\n",
        )
        .unwrap();

        let mut host = TestHost::new();
        let args = ValidateArgs {
            policy: Some(policy),
            rules: None,
        };
        let result = validate(&mut host, None, &args);

        let message = result.unwrap_err().to_string();
        assert!(message.contains("1 invalid condition(s)"), "{message}");
        assert!(message.contains("policy rule broken:"), "{message}");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_cel_rules_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let rules = temp_path(&dir, "rules.yml");
        fs::write(
            &rules,
            "schema_version: nim-audit/env-rules/v2\nrules:\n  - id: GOOD\n    when_cel: has(env.NIM_PORT)\n    message: ok\n  - id: BAD\n    when_cel: env.X.matches('a'\n    message: bad\n",
        )
        .unwrap();

        let mut host = TestHost::new();
        let args = ValidateArgs {
            policy: None,
            rules: Some(rules),
        };
        let message = validate(&mut host, None, &args).unwrap_err().to_string();
        assert!(message.contains("environment rule BAD: Unbalanced parentheses in matches()"), "{message}");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_valid_documents_summary() {
        let dir = tempfile::tempdir().unwrap();
        let rules = temp_path(&dir, "rules.yml");
        fs::write(&rules, "rules:\n  - id: R1\n    when: {env: NIM_X, set: true}\n    then: {warn: set}\n").unwrap();

        let mut host = TestHost::new();
        let args = ValidateArgs {
            policy: None,
            rules: Some(rules.clone()),
        };
        validate(&mut host, None, &args).unwrap();
        assert!(host.output_text().contains(&format!("Environment rules {rules}: 1 rule(s)")));
    }
}
