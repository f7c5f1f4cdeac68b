//! Runtime helpers bound into translated CEL expressions.

use crate::expr::{EvalError, Value};
use regex::RegexBuilder;

/// Compiled size ceiling for user-supplied patterns.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Unanchored regex search over the string form of `value`; null never matches.
pub(crate) fn matches(value: &Value, pattern: &str) -> Result<bool, EvalError> {
    if value.is_null() {
        return Ok(false);
    }

    let regex = RegexBuilder::new(pattern)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|source| EvalError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

    Ok(regex.is_match(&value.to_string()))
}

/// Length of `value`, or 0 for null and for values without a length.
pub(crate) fn size(value: &Value) -> i64 {
    value.len().map_or(0, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

/// Presence test: anything but null is present, including empty values.
pub(crate) const fn has(value: &Value) -> bool {
    !value.is_null()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ErrorKind;

    #[test]
    fn test_matches() {
        assert!(matches(&Value::from("NIM_PORT"), "^NIM_").unwrap());
        assert!(matches(&Value::from("xx NIM"), "NIM").unwrap());
        assert!(!matches(&Value::from("OTHER"), "^NIM_").unwrap());
        assert!(!matches(&Value::Null, "anything").unwrap());
        assert!(matches(&Value::Int(8000), r"^\d+$").unwrap());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = matches(&Value::from("x"), "[invalid(").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pattern);
        assert!(err.to_string().starts_with("Invalid regex '[invalid('"));
    }

    #[test]
    fn test_size_and_has() {
        assert_eq!(size(&Value::Null), 0);
        assert_eq!(size(&Value::from("abc")), 3);
        assert_eq!(size(&Value::from(vec![1, 2])), 2);
        assert_eq!(size(&Value::Int(5)), 0);
        assert!(has(&Value::from("")));
        assert!(!has(&Value::Null));
    }
}
