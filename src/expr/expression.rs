use super::ast::Node;
use super::{EvalError, parser};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// A pre-parsed expression that can be evaluated many times.
///
/// Rules keep their conditions in this form so a syntax error is reported once
/// when a policy loads rather than on every evaluation.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Arc<Node>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        Ok(Self {
            source: source.to_string(),
            root: Arc::new(parser::parse(source)?),
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn root(&self) -> &Node {
        &self.root
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl FromStr for Expression {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_source() {
        let expr: Expression = "tag != 'latest'".parse().unwrap();
        assert_eq!(expr.source(), "tag != 'latest'");
        assert_eq!(expr.to_string(), "tag != 'latest'");
    }

    #[test]
    fn test_deserialize_rejects_bad_syntax() {
        let err = serde_json::from_str::<Expression>("\"1 +\"").unwrap_err();
        assert!(err.to_string().starts_with("Invalid expression syntax"));
    }
}
