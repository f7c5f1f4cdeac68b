//! Operator semantics shared by the evaluator and the built-in functions.

use super::ast::{BinaryOp, CompareOp, UnaryOp};
use super::value::Number;
use super::{EvalError, Value};
use core::cmp::Ordering;

/// Upper bound on the length of a sequence built by repetition.
const MAX_REPEAT_LEN: usize = 10_000_000;

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    let symbol = match op {
        UnaryOp::Not => return Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::USub => "-",
        UnaryOp::UAdd => "+",
        UnaryOp::Invert => return Err(EvalError::Unsupported("Unsupported unary operator: Invert".to_string())),
    };

    match (op, operand.as_number()) {
        (UnaryOp::USub, Some(Number::Int(i))) => i.checked_neg().map(Value::Int).ok_or_else(EvalError::overflow),
        (UnaryOp::USub, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (_, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (_, Some(Number::Float(f))) => Ok(Value::Float(f)),
        _ => Err(EvalError::type_error(format!(
            "bad operand type for unary {symbol}: '{}'",
            operand.type_name()
        ))),
    }
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mult => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        _ => {
            let name: &'static str = op.into();
            return Err(EvalError::Unsupported(format!("Unsupported binary operator: {name}")));
        }
    };

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return arithmetic(op, a, b);
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => Ok(Value::Tuple(a.iter().chain(b).cloned().collect())),
        (BinaryOp::Mult, Value::Str(s), Value::Int(n)) | (BinaryOp::Mult, Value::Int(n), Value::Str(s)) => {
            let count = repeat_count(*n, s.len())?;
            Ok(Value::Str(s.repeat(count)))
        }
        (BinaryOp::Mult, Value::List(items), Value::Int(n)) | (BinaryOp::Mult, Value::Int(n), Value::List(items)) => {
            let count = repeat_count(*n, items.len())?;
            Ok(Value::List((0..count).flat_map(|_| items.iter().cloned()).collect()))
        }
        (BinaryOp::Mod, Value::Str(_), _) => Err(EvalError::Unsupported(
            "Unsupported binary operator: string formatting with '%'".to_string(),
        )),
        _ => Err(EvalError::type_error(format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn repeat_count(count: i64, unit_len: usize) -> Result<usize, EvalError> {
    let count = usize::try_from(count).unwrap_or(0);
    if unit_len.saturating_mul(count) > MAX_REPEAT_LEN {
        return Err(EvalError::runtime("MemoryError: repetition result is too large"));
    }
    Ok(count)
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Value, EvalError> {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        return match op {
            BinaryOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(EvalError::overflow),
            BinaryOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(EvalError::overflow),
            BinaryOp::Mult => x.checked_mul(y).map(Value::Int).ok_or_else(EvalError::overflow),
            BinaryOp::Mod => {
                if y == 0 {
                    return Err(EvalError::zero_division("integer modulo by zero"));
                }
                let r = x.checked_rem(y).ok_or_else(EvalError::overflow)?;
                Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
            }
            _ => true_divide(a.as_f64(), b.as_f64()),
        };
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    match op {
        BinaryOp::Add => Ok(Value::Float(x + y)),
        BinaryOp::Sub => Ok(Value::Float(x - y)),
        BinaryOp::Mult => Ok(Value::Float(x * y)),
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(EvalError::zero_division("float modulo"));
            }
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }))
        }
        _ => true_divide(x, y),
    }
}

fn true_divide(x: f64, y: f64) -> Result<Value, EvalError> {
    if y == 0.0 {
        return Err(EvalError::zero_division("division by zero"));
    }
    Ok(Value::Float(x / y))
}

pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let (symbol, accept): (&str, fn(Ordering) -> bool) = match op {
        CompareOp::Eq => return Ok(left == right),
        CompareOp::NotEq => return Ok(left != right),
        CompareOp::Is => return Ok(left.is_same(right)),
        CompareOp::IsNot => return Ok(!left.is_same(right)),
        CompareOp::In => return contains(right, left),
        CompareOp::NotIn => return contains(right, left).map(|found| !found),
        CompareOp::Lt => ("<", Ordering::is_lt),
        CompareOp::LtE => ("<=", Ordering::is_le),
        CompareOp::Gt => (">", Ordering::is_gt),
        CompareOp::GtE => (">=", Ordering::is_ge),
    };

    Ok(left.compare(right, symbol)?.is_some_and(accept))
}

/// Membership test: `item in container`.
pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            _ => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                item.type_name()
            ))),
        },
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => Ok(items.contains(item)),
        Value::Map(map) => {
            if !item.is_hashable() {
                return Err(EvalError::type_error(format!("unhashable type: '{}'", item.type_name())));
            }
            Ok(item.as_str().is_some_and(|key| map.contains_key(key)))
        }
        _ => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            container.type_name()
        ))),
    }
}

/// Subscript: `container[key]`.
pub(crate) fn index(container: &Value, key: &Value) -> Result<Value, EvalError> {
    match container {
        Value::List(items) | Value::Tuple(items) => {
            let position = sequence_position(container, key, items.len())?;
            Ok(items[position].clone())
        }
        Value::Str(s) => {
            let count = s.chars().count();
            let position = sequence_position(container, key, count)?;
            Ok(s.chars().nth(position).map_or(Value::Null, |c| Value::Str(c.to_string())))
        }
        Value::Map(map) => match key {
            Value::Str(k) => map.get(k).cloned().ok_or_else(|| EvalError::key_error(&key.repr())),
            _ if key.is_hashable() => Err(EvalError::key_error(&key.repr())),
            _ => Err(EvalError::type_error(format!("unhashable type: '{}'", key.type_name()))),
        },
        _ => Err(EvalError::type_error(format!(
            "'{}' object is not subscriptable",
            container.type_name()
        ))),
    }
}

fn sequence_position(container: &Value, key: &Value, len: usize) -> Result<usize, EvalError> {
    let kind = container.type_name();
    let index = match key {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        _ => {
            let plural = if kind == "str" { "string" } else { kind };
            return Err(EvalError::type_error(format!(
                "{plural} indices must be integers, not '{}'",
                key.type_name()
            )));
        }
    };

    let len_i64 = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len_i64 } else { index };
    usize::try_from(resolved)
        .ok()
        .filter(|&p| p < len)
        .ok_or_else(|| {
            let noun = if kind == "str" { "string" } else { kind };
            EvalError::index_error(format!("{noun} index out of range"))
        })
}
