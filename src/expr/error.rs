use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Failure raised while parsing or evaluating an expression.
///
/// The taxonomy is flat: the evaluator only distinguishes expressions it can
/// run from those it cannot. Callers decide what a failure means for their
/// rule through [`ErrorKind`].
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Invalid expression syntax: {0}")]
    Syntax(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("Expression too deeply nested (maximum depth is {max})")]
    TooDeep { max: usize },

    #[error("Cannot call non-callable value of type '{0}'")]
    NotCallable(&'static str),

    #[error("Cannot access attribute '{attr}' of type '{type_name}'")]
    AttributeAccess { attr: String, type_name: &'static str },

    #[error("{0}")]
    Runtime(String),

    #[error("Invalid regex '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl EvalError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub(crate) fn unsupported_node(kind: &str) -> Self {
        Self::Unsupported(format!("Unsupported expression type: {kind}"))
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Runtime(format!("TypeError: {}", message.into()))
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::Runtime(format!("ValueError: {}", message.into()))
    }

    pub(crate) fn key_error(key: &str) -> Self {
        Self::Runtime(format!("KeyError: {key}"))
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::Runtime(format!("IndexError: {}", message.into()))
    }

    pub(crate) fn zero_division(message: &str) -> Self {
        Self::Runtime(format!("ZeroDivisionError: {message}"))
    }

    pub(crate) fn overflow() -> Self {
        Self::Runtime("OverflowError: integer result out of range".to_string())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::UnknownVariable(_) => ErrorKind::UnknownVariable,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::TooDeep { .. } => ErrorKind::TooDeep,
            Self::NotCallable(_) => ErrorKind::NotCallable,
            Self::AttributeAccess { .. } => ErrorKind::AttributeAccess,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Pattern { .. } => ErrorKind::Pattern,
        }
    }
}

/// Coarse classification of evaluation failures, used by caller policy tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Syntax,
    UnknownVariable,
    Unsupported,
    TooDeep,
    NotCallable,
    AttributeAccess,
    Runtime,
    Pattern,

    /// The CEL rewrite itself failed before any evaluation happened.
    Translation,
}
