use crate::Result;
use camino::Utf8Path;
use ohno::IntoAppError;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

/// Parses `KEY=VALUE` lines.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is accepted,
/// and a value wrapped in matching single or double quotes is unquoted. Later
/// assignments win.
#[must_use]
pub fn parse_env_file(text: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map_or(line, str::trim_start);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        _ = env.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    env
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

pub fn load_env_file(path: &Utf8Path) -> Result<BTreeMap<String, String>> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading env file '{path}'"))?;
    Ok(parse_env_file(&text))
}

/// Parses a list of variable names found in an image, one per line.
#[must_use]
pub fn parse_discovered(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_discovered(path: &Utf8Path) -> Result<BTreeSet<String>> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading discovered variables file '{path}'"))?;
    Ok(parse_discovered(&text))
}
