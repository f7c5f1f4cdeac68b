//! Textual rewrite of CEL idioms into the restricted expression grammar.
//!
//! The rewrites run in a fixed order:
//!
//! 1. `&&` and `||` become `and` and `or`.
//! 2. `true` and `false`, in any letter case, become `True` and `False`.
//! 3. `x.matches(p)` becomes `cel_matches(x, p)`.
//! 4. `m.keys().exists(v, pred)` becomes `any((pred) for v in m.keys())`,
//!    with `pred` translated recursively.
//! 5. `x.size()` and `size(x)` become `cel_size(x)`.
//! 6. `has(x)` becomes `cel_has(x)`.
//! 7. Unary `!` becomes `not `, leaving `!=` alone.

use regex::Regex;
use std::sync::LazyLock;

/// Characters that end the receiver of a `.matches(` call when scanning backward.
const RECEIVER_DELIMITERS: &str = " \t\r\n&|=!<>+-*/%,:";

static TRUE_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\btrue\b").expect("invalid regex"));
static FALSE_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bfalse\b").expect("invalid regex"));
static MATCHES_CALL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.matches\(").expect("invalid regex"));
static EXISTS_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:[a-zA-Z_][a-zA-Z0-9_]*\.)*[a-zA-Z_][a-zA-Z0-9_]*)\.keys\(\)\.exists\(").expect("invalid regex")
});
static SIZE_METHOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:[a-zA-Z_][a-zA-Z0-9_]*\.)*[a-zA-Z_][a-zA-Z0-9_]*)\.size\(\)").expect("invalid regex")
});
static SIZE_FUNCTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(^|[^a-zA-Z0-9_.])size\(").expect("invalid regex"));
static HAS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bhas\(").expect("invalid regex"));

/// Failure to rewrite a CEL expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("Unbalanced parentheses in {call}()")]
    UnbalancedParentheses { call: &'static str },

    #[error("Could not split exists() args")]
    SplitArguments,
}

/// Rewrites a CEL expression into the restricted expression grammar.
pub fn translate(expression: &str) -> Result<String, TranslateError> {
    let s = outside_strings(expression.trim(), |code| {
        let code = code.replace("&&", " and ").replace("||", " or ");
        let code = TRUE_LITERAL.replace_all(&code, "True");
        FALSE_LITERAL.replace_all(&code, "False").into_owned()
    });

    let s = replace_matches(&s)?;
    let s = replace_exists(&s)?;

    let s = outside_strings(&s, |code| {
        let code = SIZE_METHOD.replace_all(code, "cel_size(${1})");
        let code = SIZE_FUNCTION.replace_all(&code, "${1}cel_size(");
        HAS_FUNCTION.replace_all(&code, "cel_has(").into_owned()
    });

    Ok(replace_not(&s))
}

/// Applies `rewrite` to each run of `s` outside string literals.
fn outside_strings(s: &str, rewrite: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(s.len());
    let mut quotes = QuoteState::default();
    let mut run_start = 0;
    let mut in_string = false;

    for (offset, ch) in s.char_indices() {
        let quoted = quotes.in_string(ch);
        if quoted != in_string {
            let run = &s[run_start..offset];
            if in_string {
                out.push_str(run);
            } else {
                out.push_str(&rewrite(run));
            }
            run_start = offset;
            in_string = quoted;
        }
    }

    let run = &s[run_start..];
    if in_string {
        out.push_str(run);
    } else {
        out.push_str(&rewrite(run));
    }
    out
}

/// Tracks whether a forward scan is inside a quoted string.
#[derive(Debug, Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feeds one character and reports whether it is part of a string literal.
    fn in_string(&mut self, ch: char) -> bool {
        match self.quote {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == q {
                    self.quote = None;
                }
                true
            }
            None if ch == '\'' || ch == '"' => {
                self.quote = Some(ch);
                true
            }
            None => false,
        }
    }
}

/// Byte offset of the `)` closing a call whose arguments start at `open`.
fn closing_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quotes = QuoteState::default();
    for (offset, ch) in s[open..].char_indices() {
        if quotes.in_string(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte offset where the receiver ending at `end` begins.
///
/// Scans backward past balanced brackets and quoted strings, stopping at a
/// delimiter or an unmatched opening bracket.
fn receiver_start(s: &str, end: usize) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, ch) in s[..end].char_indices().rev() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            ')' | ']' | '}' => depth += 1,
            '(' | '[' | '{' => {
                if depth == 0 {
                    return offset + ch.len_utf8();
                }
                depth -= 1;
            }
            _ if depth == 0 && RECEIVER_DELIMITERS.contains(ch) => return offset + ch.len_utf8(),
            _ => {}
        }
    }
    0
}

fn replace_matches(expression: &str) -> Result<String, TranslateError> {
    let mut s = expression.to_string();
    while let Some(m) = MATCHES_CALL.find(&s) {
        let close = closing_paren(&s, m.end()).ok_or(TranslateError::UnbalancedParentheses { call: "matches" })?;
        let argument = s[m.end()..close].trim();

        let receiver_end = s[..m.start()].trim_end().len();
        let start = receiver_start(&s, receiver_end);
        let receiver = s[start..receiver_end].trim();

        s = format!("{}cel_matches({receiver}, {argument}){}", &s[..start], &s[close + 1..]);
    }
    Ok(s)
}

fn replace_exists(expression: &str) -> Result<String, TranslateError> {
    let mut s = expression.to_string();
    while let Some(captures) = EXISTS_CALL.captures(&s) {
        let (Some(whole), Some(map)) = (captures.get(0), captures.get(1)) else {
            break;
        };

        let close = closing_paren(&s, whole.end()).ok_or(TranslateError::UnbalancedParentheses { call: "exists" })?;
        let (var, predicate) = split_top_level(s[whole.end()..close].trim())?;
        let predicate = translate(predicate)?;

        s = format!(
            "{}any(({predicate}) for {var} in {}.keys()){}",
            &s[..whole.start()],
            map.as_str(),
            &s[close + 1..]
        );
    }
    Ok(s)
}

/// Splits `a, b` at the first comma outside brackets and quotes.
fn split_top_level(s: &str) -> Result<(&str, &str), TranslateError> {
    let mut depth = 0usize;
    let mut quotes = QuoteState::default();
    for (offset, ch) in s.char_indices() {
        if quotes.in_string(ch) {
            continue;
        }
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Ok((s[..offset].trim(), s[offset + 1..].trim())),
            _ => {}
        }
    }
    Err(TranslateError::SplitArguments)
}

/// Replaces unary `!` outside string literals with `not `.
fn replace_not(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut quotes = QuoteState::default();
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if !quotes.in_string(ch) && ch == '!' && chars.peek() != Some(&'=') {
            out.push_str("not ");
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_operators_and_literals() {
        assert_eq!(translate("a && b || c").unwrap(), "a  and  b  or  c");
        assert_eq!(translate("x == TRUE").unwrap(), "x == True");
        assert_eq!(translate("false").unwrap(), "False");
        assert_eq!(translate("  spaced  ").unwrap(), "spaced");
    }

    #[test]
    fn test_string_contents_are_left_alone() {
        assert_eq!(translate("flag == 'true'").unwrap(), "flag == 'true'");
        assert_eq!(translate("x == \"FALSE\" || y").unwrap(), "x == \"FALSE\"  or  y");
        assert_eq!(translate("s == 'a && b'").unwrap(), "s == 'a && b'");
        assert_eq!(translate("s == 'has(x)' && size(y) > 0").unwrap(), "s == 'has(x)'  and  cel_size(y) > 0");
        assert_eq!(translate("s == 'it\\'s true' && true").unwrap(), "s == 'it\\'s true'  and  True");
    }

    #[test]
    fn test_matches() {
        assert_eq!(translate("env.matches('^NIM_.*')").unwrap(), "cel_matches(env, '^NIM_.*')");
        assert_eq!(
            translate("a == 1 && env.NAME.matches('(x|y),z')").unwrap(),
            "a == 1  and  cel_matches(env.NAME, '(x|y),z')"
        );
        assert_eq!(translate("(x.matches('a'))").unwrap(), "(cel_matches(x, 'a'))");
        assert_eq!(
            translate("labels.get('a b').matches('v')").unwrap(),
            "cel_matches(labels.get('a b'), 'v')"
        );
        assert_eq!(
            translate("x.matches('a') && y.matches(\"b\")").unwrap(),
            "cel_matches(x, 'a')  and  cel_matches(y, \"b\")"
        );
    }

    #[test]
    fn test_matches_unbalanced() {
        assert_eq!(
            translate("x.matches('a'").unwrap_err().to_string(),
            "Unbalanced parentheses in matches()"
        );
        assert_eq!(
            translate("x.matches('a)'").unwrap_err(),
            TranslateError::UnbalancedParentheses { call: "matches" }
        );
    }

    #[test]
    fn test_exists() {
        assert_eq!(
            translate("labels.keys().exists(k, k.matches('^nim'))").unwrap(),
            "any((cel_matches(k, '^nim')) for k in labels.keys())"
        );
        assert_eq!(
            translate("env.keys().exists(k, k == 'A' || !has(env.B))").unwrap(),
            "any((k == 'A'  or  not cel_has(env.B)) for k in env.keys())"
        );
        assert_eq!(
            translate("meta.vars.keys().exists(v, v == 'x')").unwrap(),
            "any((v == 'x') for v in meta.vars.keys())"
        );
    }

    #[test]
    fn test_exists_errors() {
        assert_eq!(translate("m.keys().exists(k)").unwrap_err(), TranslateError::SplitArguments);
        assert_eq!(
            translate("m.keys().exists(k, f(k)").unwrap_err(),
            TranslateError::UnbalancedParentheses { call: "exists" }
        );
    }

    #[test]
    fn test_size() {
        assert_eq!(translate("tags.size() > 0").unwrap(), "cel_size(tags) > 0");
        assert_eq!(translate("size(tags) > 0").unwrap(), "cel_size(tags) > 0");
        assert_eq!(translate("meta.known.size() == 2").unwrap(), "cel_size(meta.known) == 2");
        assert_eq!(translate("x && size(y)").unwrap(), "x  and  cel_size(y)");
        assert_eq!(translate("max_size(y)").unwrap(), "max_size(y)");
    }

    #[test]
    fn test_has_and_not() {
        assert_eq!(translate("!has(labels.missing)").unwrap(), "not cel_has(labels.missing)");
        assert_eq!(translate("a != 1 && !has(b)").unwrap(), "a != 1  and  not cel_has(b)");
        assert_eq!(translate("x == '!'").unwrap(), "x == '!'");
        assert_eq!(translate("!!x").unwrap(), "not not x");
    }
}
