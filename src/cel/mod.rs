//! CEL-flavored condition language.
//!
//! A CEL expression is rewritten into the restricted expression grammar by
//! [`translate`] and then evaluated with the CEL helper table
//! (`cel_matches`, `cel_size`, `cel_has`, `any`, `all`, `int`). Mapping values
//! also expose their keys as fields, so `env.NIM_PORT` reads a variable and
//! yields null when it is absent.
//!
//! ```
//! use nim_audit::cel;
//! use nim_audit::expr::Context;
//!
//! let ctx = Context::new().with("env", "NIM_PORT");
//! assert!(cel::evaluate_cel("env.matches('^NIM_.*')", &ctx).unwrap());
//! ```

pub(crate) mod helpers;
mod translate;

pub use translate::{TranslateError, translate};

use crate::expr::{Context, ErrorKind, EvalError, Evaluator, FunctionTable, Value};

/// Default nesting bound for translated CEL expressions.
///
/// Translation wraps predicates in extra calls and generators, so CEL gets more
/// headroom than hand-written conditions.
pub const DEFAULT_CEL_MAX_DEPTH: usize = 32;

/// Failure of either CEL stage.
#[derive(Debug, thiserror::Error)]
#[error(
    "CEL evaluation failed: expr='{expression}' translated='{}': {cause}",
    .translated.as_deref().unwrap_or("<untranslated>")
)]
pub struct CelError {
    expression: String,
    translated: Option<String>,
    #[source]
    cause: CelCause,
}

#[derive(Debug, thiserror::Error)]
pub enum CelCause {
    #[error(transparent)]
    Translation(#[from] TranslateError),

    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

impl CelError {
    fn new(expression: &str, translated: Option<String>, cause: impl Into<CelCause>) -> Self {
        Self {
            expression: expression.to_string(),
            translated,
            cause: cause.into(),
        }
    }

    /// The CEL text as written.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The rewritten text, absent when translation itself failed.
    #[must_use]
    pub fn translated(&self) -> Option<&str> {
        self.translated.as_deref()
    }

    #[must_use]
    pub const fn cause(&self) -> &CelCause {
        &self.cause
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match &self.cause {
            CelCause::Translation(_) => ErrorKind::Translation,
            CelCause::Evaluation(e) => e.kind(),
        }
    }
}

/// Evaluator for CEL conditions.
#[derive(Debug, Clone)]
pub struct CelEvaluator {
    inner: Evaluator,
}

impl Default for CelEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_CEL_MAX_DEPTH)
    }
}

impl CelEvaluator {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            inner: Evaluator::new()
                .with_max_depth(max_depth)
                .with_functions(FunctionTable::cel())
                .with_mapping_fields(true),
        }
    }

    /// Translates and evaluates `expression`, coercing the result to a boolean.
    pub fn evaluate(&self, expression: &str, context: &Context) -> Result<bool, CelError> {
        let translated = translate(expression).map_err(|e| CelError::new(expression, None, e))?;
        match self.inner.evaluate(&translated, context) {
            Ok(value) => Ok(value.is_truthy()),
            Err(e) => Err(CelError::new(expression, Some(translated), e)),
        }
    }
}

/// Evaluates a CEL condition with a default [`CelEvaluator`].
pub fn evaluate_cel(expression: &str, context: &Context) -> Result<bool, CelError> {
    CelEvaluator::default().evaluate(expression, context)
}

/// Unanchored regex search of `pattern` over the string form of `value`.
pub fn cel_matches(value: &Value, pattern: &str) -> Result<bool, CelError> {
    helpers::matches(value, pattern).map_err(|e| CelError::new(&format!("cel_matches({}, {pattern:?})", value.repr()), None, e))
}

/// Length of `value`; 0 for null or anything without a length.
#[must_use]
pub fn cel_size(value: &Value) -> i64 {
    helpers::size(value)
}

/// Whether `value` is present (not null).
#[must_use]
pub const fn cel_has(value: &Value) -> bool {
    helpers::has(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_evaluate_coerces_to_bool() {
        let ctx = Context::new().with("tags", vec![1, 2]);
        assert!(evaluate_cel("tags", &ctx).unwrap());
        assert!(!evaluate_cel("tags.size() == 0", &ctx).unwrap());
    }

    #[test]
    fn test_translation_failure_has_no_translated_form() {
        let err = evaluate_cel("x.matches('a'", &Context::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Translation);
        assert_eq!(err.expression(), "x.matches('a'");
        assert!(err.translated().is_none());
        assert!(matches!(err.cause(), CelCause::Translation(_)));
    }

    #[test]
    fn test_evaluation_failure_keeps_both_forms() {
        let err = evaluate_cel("missing && true", &Context::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownVariable);
        assert_eq!(err.translated(), Some("missing  and  True"));
        let message = err.to_string();
        assert!(message.contains("expr='missing && true'"));
        assert!(message.contains("Unknown variable: missing"));
    }

    #[test]
    fn test_standard_builtins_are_not_visible() {
        let ctx = Context::new().with("xs", vec![1]);
        assert_eq!(evaluate_cel("len(xs) == 1", &ctx).unwrap_err().kind(), ErrorKind::UnknownVariable);
        assert!(evaluate_cel("int('3') == 3", &ctx).unwrap());
    }

    #[test]
    fn test_mapping_fields() {
        let env: BTreeMap<String, Value> = BTreeMap::from([("NIM_PORT".to_string(), Value::from("8000"))]);
        let ctx = Context::new().with("env", env);
        assert!(evaluate_cel("has(env.NIM_PORT) && !has(env.OTHER)", &ctx).unwrap());
        assert!(evaluate_cel("int(env.NIM_PORT) > 1024", &ctx).unwrap());
    }

    #[test]
    fn test_public_helpers() {
        assert!(cel_matches(&Value::from("abc"), "b").unwrap());
        let err = cel_matches(&Value::from("abc"), "[invalid(").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pattern);
        assert_eq!(cel_size(&Value::Null), 0);
        assert!(!cel_has(&Value::Null));
    }
}
