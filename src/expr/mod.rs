//! Restricted expression language.
//!
//! Expressions use a small, side-effect free subset of Python expression
//! syntax: literals, names, arithmetic, comparisons, boolean logic, container
//! displays, conditional expressions, single-loop comprehensions, calls to
//! sanctioned built-ins, and calls to allow-listed methods on strings,
//! mappings, and lists. Anything else is rejected with an [`EvalError`].
//!
//! ```
//! use nim_audit::expr::{Context, Evaluator, Value};
//!
//! let ctx = Context::new().with("tag", "latest");
//! let result = Evaluator::new().evaluate("tag != 'latest'", &ctx).unwrap();
//! assert_eq!(result, Value::Bool(false));
//! ```

mod ast;
mod context;
mod error;
mod evaluator;
mod expression;
mod functions;
mod lexer;
mod methods;
mod ops;
mod parser;
mod value;

pub use context::Context;
pub use error::{ErrorKind, EvalError};
pub use evaluator::{DEFAULT_MAX_DEPTH, Evaluator};
pub use expression::Expression;
pub use functions::{Builtin, FunctionTable};
pub use methods::BoundMethod;
pub use value::Value;

/// Evaluates `source` against `context` with a default [`Evaluator`].
pub fn evaluate(source: &str, context: &Context) -> Result<Value, EvalError> {
    Evaluator::new().evaluate(source, context)
}
