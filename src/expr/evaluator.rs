//! Tree-walking evaluator over the restricted expression grammar.
//!
//! Every node kind outside the allow-list fails with an
//! [`EvalError::Unsupported`] naming the offending construct. Evaluation never
//! touches ambient state: a name resolves to a context variable, a loop
//! variable, a built-in from the evaluator's [`FunctionTable`], or one of the
//! literal aliases `true`, `false`, and `null`.

use super::ast::{BoolOp, Generator, Node};
use super::functions::{Arguments, FunctionTable};
use super::methods::{BoundMethod, Method};
use super::{Context, EvalError, Expression, Value, ops};

const LOG_TARGET: &str = "      expr";

/// Default bound on the nesting depth of an evaluated expression.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Evaluates expressions against a [`Context`].
///
/// An evaluator is immutable configuration and can be shared freely; each call
/// to [`evaluate`](Self::evaluate) is independent of every other.
#[derive(Debug, Clone)]
pub struct Evaluator {
    max_depth: usize,
    functions: FunctionTable,
    mapping_fields: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            functions: FunctionTable::standard(),
            mapping_fields: false,
        }
    }
}

/// Variable lookup chain. Comprehension loop variables push a local frame
/// that shadows everything beneath it.
enum Scope<'a> {
    Root(&'a Context),
    Local {
        name: &'a str,
        value: &'a Value,
        parent: &'a Scope<'a>,
    },
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Root(context) => context.get(name),
            Self::Local { name: local, value, parent } => {
                if *local == name {
                    Some(value)
                } else {
                    parent.lookup(name)
                }
            }
        }
    }
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Lets `m.field` read a key of a mapping, yielding null when absent.
    ///
    /// Method names on mappings (`get`, `keys`, `values`, `items`) still take
    /// precedence over keys of the same name.
    #[must_use]
    pub const fn with_mapping_fields(mut self, enabled: bool) -> Self {
        self.mapping_fields = enabled;
        self
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub const fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Parses and evaluates `source`.
    pub fn evaluate(&self, source: &str, context: &Context) -> Result<Value, EvalError> {
        let expression = Expression::parse(source)?;
        self.evaluate_expression(&expression, context)
    }

    /// Evaluates an already parsed expression.
    pub fn evaluate_expression(&self, expression: &Expression, context: &Context) -> Result<Value, EvalError> {
        let result = self.eval(expression.root(), &Scope::Root(context), 0);
        if let Err(e) = &result {
            log::trace!(target: LOG_TARGET, "'{}' failed: {e}", expression.source());
        }
        result
    }

    fn eval(&self, node: &Node, scope: &Scope<'_>, depth: usize) -> Result<Value, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::TooDeep { max: self.max_depth });
        }

        let next = depth + 1;
        match node {
            Node::Constant(value) => Ok(value.clone()),
            Node::Name(name) => self.resolve_name(name, scope),

            Node::Attribute { value, attr } => {
                let receiver = self.eval(value, scope, next)?;
                self.attribute(receiver, attr)
            }

            Node::Subscript { value, index } => {
                let container = self.eval(value, scope, next)?;
                let key = self.eval(index, scope, next)?;
                ops::index(&container, &key)
            }

            Node::Call { func, args, keywords } => {
                let callee = self.eval(func, scope, next)?;
                let positional = args
                    .iter()
                    .map(|arg| self.eval(arg, scope, next))
                    .collect::<Result<Vec<_>, _>>()?;
                let keywords = keywords
                    .iter()
                    .map(|(name, arg)| Ok((name.clone(), self.eval(arg, scope, next)?)))
                    .collect::<Result<Vec<_>, EvalError>>()?;
                let arguments = Arguments::new(positional, keywords);

                match callee {
                    Value::Builtin(builtin) => builtin.call(arguments),
                    Value::Method(method) => method.call(arguments),
                    other => Err(EvalError::NotCallable(other.type_name())),
                }
            }

            Node::Compare { left, comparisons } => {
                let mut left = self.eval(left, scope, next)?;
                for (op, right) in comparisons {
                    let right = self.eval(right, scope, next)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }

            Node::BoolOp { op, values } => {
                // `and` stops at the first falsy operand, `or` at the first truthy one
                let stop_when = matches!(op, BoolOp::Or);
                for value in values {
                    if self.eval(value, scope, next)?.is_truthy() == stop_when {
                        return Ok(Value::Bool(stop_when));
                    }
                }
                Ok(Value::Bool(!stop_when))
            }

            Node::UnaryOp { op, operand } => {
                let operand = self.eval(operand, scope, next)?;
                ops::unary(*op, &operand)
            }

            Node::BinOp { left, op, right } => {
                let left = self.eval(left, scope, next)?;
                let right = self.eval(right, scope, next)?;
                ops::binary(*op, &left, &right)
            }

            Node::List(items) => Ok(Value::List(self.eval_all(items, scope, next)?)),
            Node::Tuple(items) => Ok(Value::Tuple(self.eval_all(items, scope, next)?)),
            Node::Set(items) => Value::set_from(self.eval_all(items, scope, next)?),

            Node::Dict(entries) => {
                let mut map = std::collections::BTreeMap::new();
                for (key, value) in entries {
                    let key = match self.eval(key, scope, next)? {
                        Value::Str(key) => key,
                        other => {
                            return Err(EvalError::type_error(format!(
                                "mapping keys must be str, not '{}'",
                                other.type_name()
                            )));
                        }
                    };
                    let value = self.eval(value, scope, next)?;
                    _ = map.insert(key, value);
                }
                Ok(Value::Map(map))
            }

            Node::IfExp { test, body, orelse } => {
                if self.eval(test, scope, next)?.is_truthy() {
                    self.eval(body, scope, next)
                } else {
                    self.eval(orelse, scope, next)
                }
            }

            Node::Comprehension { element, generators } => {
                let [generator] = generators.as_slice() else {
                    return Err(EvalError::Unsupported(
                        "Only single-loop comprehensions are supported".to_string(),
                    ));
                };
                self.comprehension(element, generator, scope, next)
            }

            Node::Unsupported(kind) => Err(EvalError::unsupported_node(kind)),
        }
    }

    fn eval_all(&self, nodes: &[Node], scope: &Scope<'_>, depth: usize) -> Result<Vec<Value>, EvalError> {
        nodes.iter().map(|node| self.eval(node, scope, depth)).collect()
    }

    fn resolve_name(&self, name: &str, scope: &Scope<'_>) -> Result<Value, EvalError> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value.clone());
        }

        if let Some(builtin) = self.functions.resolve(name) {
            return Ok(Value::Builtin(builtin));
        }

        match name {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" => Ok(Value::Null),
            _ => Err(EvalError::UnknownVariable(name.to_string())),
        }
    }

    fn attribute(&self, receiver: Value, attr: &str) -> Result<Value, EvalError> {
        if let Some(method) = Method::lookup(&receiver, attr) {
            return Ok(Value::Method(Box::new(BoundMethod::new(receiver, method))));
        }

        if self.mapping_fields
            && let Value::Map(map) = &receiver
        {
            return Ok(map.get(attr).cloned().unwrap_or(Value::Null));
        }

        Err(EvalError::AttributeAccess {
            attr: attr.to_string(),
            type_name: receiver.type_name(),
        })
    }

    fn comprehension(&self, element: &Node, generator: &Generator, scope: &Scope<'_>, depth: usize) -> Result<Value, EvalError> {
        let Node::Name(target) = &generator.target else {
            return Err(EvalError::Unsupported("Only simple loop variables are supported".to_string()));
        };

        let items = self.eval(&generator.iter, scope, depth)?.iterate()?;
        let mut results = Vec::new();
        'items: for item in &items {
            let local = Scope::Local {
                name: target,
                value: item,
                parent: scope,
            };

            for condition in &generator.conditions {
                if !self.eval(condition, &local, depth)?.is_truthy() {
                    continue 'items;
                }
            }

            results.push(self.eval(element, &local, depth)?);
        }

        Ok(Value::List(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Builtin, ErrorKind};

    fn eval(source: &str) -> Result<Value, EvalError> {
        Evaluator::new().evaluate(source, &Context::new())
    }

    fn eval_with(source: &str, ctx: &Context) -> Result<Value, EvalError> {
        Evaluator::new().evaluate(source, ctx)
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("42").unwrap(), Value::Int(42));
        assert_eq!(eval("'hello'").unwrap(), Value::from("hello"));
        assert_eq!(eval("None").unwrap(), Value::Null);
        assert_eq!(eval("[1, 2]").unwrap(), Value::from(vec![1, 2]));
        assert_eq!(eval("(1,)").unwrap(), Value::Tuple(vec![Value::Int(1)]));
        assert_eq!(eval("{'a': 1}").unwrap(), Value::from(std::collections::BTreeMap::from([("a".to_string(), 1)])));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Int(2));
        assert_eq!(eval("'a' + 'b'").unwrap(), Value::from("ab"));
    }

    #[test]
    fn test_unsupported_operators() {
        assert_eq!(eval("2 ** 3").unwrap_err().to_string(), "Unsupported binary operator: Pow");
        assert_eq!(eval("7 // 2").unwrap_err().to_string(), "Unsupported binary operator: FloorDiv");
        assert_eq!(eval("~1").unwrap_err().to_string(), "Unsupported unary operator: Invert");
    }

    #[test]
    fn test_boolean_ops_short_circuit_and_return_bools() {
        assert_eq!(eval("False and undefined_var").unwrap(), Value::Bool(false));
        assert_eq!(eval("True or undefined_var").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 and 'x'").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 or ''").unwrap(), Value::Bool(false));
        assert_eq!(eval("True and undefined_var").unwrap_err().kind(), ErrorKind::UnknownVariable);
    }

    #[test]
    fn test_compare_chain() {
        assert_eq!(eval("1 < 2 < 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("3 > 2 > 2").unwrap(), Value::Bool(false));
        assert_eq!(eval("2 > 3 > undefined").unwrap(), Value::Bool(false));
        assert_eq!(eval("'a' in ['a', 'b']").unwrap(), Value::Bool(true));
        assert_eq!(eval("None is None").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_if_expression_evaluates_one_branch() {
        assert_eq!(eval("'yes' if True else undefined").unwrap(), Value::from("yes"));
        assert_eq!(eval("undefined if False else 'no'").unwrap(), Value::from("no"));
    }

    #[test]
    fn test_name_resolution_order() {
        assert_eq!(eval("true").unwrap(), Value::Bool(true));
        assert_eq!(eval("null").unwrap(), Value::Null);
        assert_eq!(eval("len").unwrap(), Value::Builtin(Builtin::Len));

        let ctx = Context::new().with("len", 5).with("true", "shadowed");
        assert_eq!(eval_with("len", &ctx).unwrap(), Value::Int(5));
        assert_eq!(eval_with("true", &ctx).unwrap(), Value::from("shadowed"));

        assert_eq!(eval("missing").unwrap_err().to_string(), "Unknown variable: missing");
    }

    #[test]
    fn test_builtin_and_method_calls() {
        let ctx = Context::new().with("tag", "1.2.3").with("ports", vec![8000, 8080]);
        assert_eq!(eval_with("len(ports)", &ctx).unwrap(), Value::Int(2));
        assert_eq!(eval_with("tag.split('.')[0]", &ctx).unwrap(), Value::from("1"));
        assert_eq!(eval_with("tag.startswith('1.')", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("sorted([3, 1, 2], reverse=True)").unwrap(), Value::from(vec![3, 2, 1]));
    }

    #[test]
    fn test_calling_non_callables() {
        let ctx = Context::new().with("x", 1);
        assert_eq!(eval_with("x()", &ctx).unwrap_err().kind(), ErrorKind::NotCallable);
        assert_eq!(eval("'abc'()").unwrap_err().kind(), ErrorKind::NotCallable);
    }

    #[test]
    fn test_attribute_access_is_restricted() {
        let ctx = Context::new().with("config", std::collections::BTreeMap::from([("User".to_string(), "root")]));
        assert_eq!(eval_with("config.User", &ctx).unwrap_err().kind(), ErrorKind::AttributeAccess);
        assert_eq!(eval("'x'.__class__").unwrap_err().kind(), ErrorKind::AttributeAccess);
        assert_eq!(eval("(1).real").unwrap_err().kind(), ErrorKind::AttributeAccess);

        let fields = Evaluator::new().with_mapping_fields(true);
        assert_eq!(fields.evaluate("config.User", &ctx).unwrap(), Value::from("root"));
        assert_eq!(fields.evaluate("config.Missing", &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_comprehensions() {
        let ctx = Context::new().with("items", vec![1, 2, 3, 4]);
        assert_eq!(eval_with("[x * 2 for x in items if x > 2]", &ctx).unwrap(), Value::from(vec![6, 8]));
        assert_eq!(eval_with("any(x > 3 for x in items)", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval_with("all(x > 3 for x in items)", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(
            eval_with("[x for x in items for y in items]", &ctx).unwrap_err().to_string(),
            "Only single-loop comprehensions are supported"
        );
        assert_eq!(
            eval_with("[a for (a, b) in items]", &ctx).unwrap_err().to_string(),
            "Only simple loop variables are supported"
        );
    }

    #[test]
    fn test_loop_variable_shadows_context() {
        let ctx = Context::new().with("x", "outer").with("items", vec![1, 2]);
        assert_eq!(eval_with("[x for x in items]", &ctx).unwrap(), Value::from(vec![1, 2]));
        assert_eq!(eval_with("x", &ctx).unwrap(), Value::from("outer"));
    }

    #[test]
    fn test_unsupported_constructs() {
        assert_eq!(eval("lambda: 1").unwrap_err().to_string(), "Unsupported expression type: Lambda");
        assert_eq!(eval("{x for x in [1]}").unwrap_err().to_string(), "Unsupported expression type: SetComp");
        assert_eq!(eval("[1, 2][0:1]").unwrap_err().to_string(), "Unsupported expression type: Slice");
    }

    #[test]
    fn test_depth_limit() {
        let shallow = Evaluator::new().with_max_depth(3);
        assert_eq!(shallow.evaluate("[[[1]]]", &Context::new()).unwrap(), Value::from(vec![vec![vec![1]]]));
        assert_eq!(shallow.evaluate("[[[[1]]]]", &Context::new()).unwrap_err().kind(), ErrorKind::TooDeep);
        assert_eq!(
            Evaluator::new().with_max_depth(0).evaluate("1", &Context::new()).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_function_table_controls_visibility() {
        let evaluator = Evaluator::new().with_functions(FunctionTable::empty().with(Builtin::Len));
        assert_eq!(evaluator.evaluate("len('ab')", &Context::new()).unwrap(), Value::Int(2));
        assert_eq!(
            evaluator.evaluate("max(1, 2)", &Context::new()).unwrap_err().kind(),
            ErrorKind::UnknownVariable
        );
    }

    #[test]
    fn test_deterministic() {
        let ctx = Context::new().with("labels", std::collections::BTreeMap::from([("b".to_string(), 2), ("a".to_string(), 1)]));
        let first = eval_with("[k for k in labels]", &ctx).unwrap();
        for _ in 0..10 {
            assert_eq!(eval_with("[k for k in labels]", &ctx).unwrap(), first);
        }
    }
}
