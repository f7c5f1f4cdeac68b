use super::Value;
use std::collections::BTreeMap;

/// Named values an expression may read.
///
/// A context is read-only during evaluation; comprehension loop variables live
/// in a separate scope that shadows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        _ = self.vars.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Builds a context from a JSON object, one variable per member.
    ///
    /// Returns `None` when `value` is not an object.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(members) => Some(members.into_iter().collect()),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let ctx = Context::from_json(serde_json::json!({"tag": "1.0", "ports": [8000]})).unwrap();
        assert_eq!(ctx.get("tag"), Some(&Value::from("1.0")));
        assert_eq!(ctx.get("ports"), Some(&Value::from(vec![8000])));
        assert!(Context::from_json(serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn test_builder() {
        let ctx = Context::new().with("a", 1).with("b", "x");
        assert_eq!(ctx.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
