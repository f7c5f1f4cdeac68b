//! Sanctioned built-in functions and the tables that expose them by name.

use super::ast::BinaryOp;
use super::{EvalError, Value, ops};
use crate::cel::helpers;
use core::cmp::Ordering;
use std::collections::BTreeMap;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// A built-in function an expression may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
    Set,
    Min,
    Max,
    Sum,
    Abs,
    All,
    Any,
    Sorted,
    Reversed,
    CelMatches,
    CelSize,
    CelHas,
}

impl Builtin {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub(crate) fn call(self, args: Arguments) -> Result<Value, EvalError> {
        let name = self.name();
        match self {
            Self::Len => {
                let [obj] = args.bind(name, ["obj"])?;
                let obj = required(obj, name, "obj")?;
                obj.len()
                    .map(|n| Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
                    .ok_or_else(|| EvalError::type_error(format!("object of type '{}' has no len()", obj.type_name())))
            }
            Self::Str => {
                let [obj] = args.bind(name, ["object"])?;
                Ok(Value::Str(obj.map(|v| v.to_string()).unwrap_or_default()))
            }
            Self::Int => {
                let [x, base] = args.bind(name, ["x", "base"])?;
                to_int(x, base)
            }
            Self::Float => {
                let [x] = args.bind(name, ["x"])?;
                to_float(x)
            }
            Self::Bool => {
                let [x] = args.bind(name, ["x"])?;
                Ok(Value::Bool(x.is_some_and(|v| v.is_truthy())))
            }
            Self::List => {
                let [iterable] = args.bind(name, ["iterable"])?;
                Ok(Value::List(iterable.map(|v| v.iterate()).transpose()?.unwrap_or_default()))
            }
            Self::Set => {
                let [iterable] = args.bind(name, ["iterable"])?;
                Value::set_from(iterable.map(|v| v.iterate()).transpose()?.unwrap_or_default())
            }
            Self::Dict => to_dict(args),
            Self::Min => extreme(name, args, Ordering::Less),
            Self::Max => extreme(name, args, Ordering::Greater),
            Self::Sum => {
                let [iterable, start] = args.bind(name, ["iterable", "start"])?;
                let iterable = required(iterable, name, "iterable")?;
                let start = start.unwrap_or(Value::Int(0));
                if matches!(start, Value::Str(_)) {
                    return Err(EvalError::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
                }
                iterable
                    .iterate()?
                    .iter()
                    .try_fold(start, |total, item| ops::binary(BinaryOp::Add, &total, item))
            }
            Self::Abs => {
                let [x] = args.bind(name, ["x"])?;
                match required(x, name, "x")? {
                    Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(EvalError::overflow),
                    Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(EvalError::type_error(format!("bad operand type for abs(): '{}'", other.type_name()))),
                }
            }
            Self::All => {
                let [iterable] = args.bind(name, ["iterable"])?;
                Ok(Value::Bool(required(iterable, name, "iterable")?.iterate()?.iter().all(Value::is_truthy)))
            }
            Self::Any => {
                let [iterable] = args.bind(name, ["iterable"])?;
                Ok(Value::Bool(required(iterable, name, "iterable")?.iterate()?.iter().any(Value::is_truthy)))
            }
            Self::Sorted => {
                let [iterable, reverse] = args.bind(name, ["iterable", "reverse"])?;
                let mut items = required(iterable, name, "iterable")?.iterate()?;
                sort_values(&mut items, reverse.is_some_and(|r| r.is_truthy()))?;
                Ok(Value::List(items))
            }
            Self::Reversed => {
                let [sequence] = args.bind(name, ["sequence"])?;
                let sequence = required(sequence, name, "sequence")?;
                if matches!(sequence, Value::Set(_)) {
                    return Err(EvalError::type_error("'set' object is not reversible"));
                }
                let mut items = sequence.iterate()?;
                items.reverse();
                Ok(Value::List(items))
            }
            Self::CelMatches => {
                let [value, pattern] = args.bind(name, ["value", "pattern"])?;
                let value = required(value, name, "value")?;
                let pattern = required(pattern, name, "pattern")?;
                let Some(pattern) = pattern.as_str() else {
                    return Err(EvalError::type_error(format!(
                        "cel_matches() pattern must be a string, not '{}'",
                        pattern.type_name()
                    )));
                };
                helpers::matches(&value, pattern).map(Value::Bool)
            }
            Self::CelSize => {
                let [value] = args.bind(name, ["value"])?;
                Ok(Value::Int(helpers::size(&required(value, name, "value")?)))
            }
            Self::CelHas => {
                let [value] = args.bind(name, ["value"])?;
                Ok(Value::Bool(helpers::has(&required(value, name, "value")?)))
            }
        }
    }
}

/// The set of built-ins visible to an evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTable {
    functions: Vec<Builtin>,
}

impl FunctionTable {
    /// The general-purpose built-ins available to policy conditions.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            functions: Builtin::iter()
                .filter(|b| !matches!(b, Builtin::CelMatches | Builtin::CelSize | Builtin::CelHas))
                .collect(),
        }
    }

    /// The helpers bound into translated CEL expressions.
    #[must_use]
    pub fn cel() -> Self {
        Self {
            functions: vec![
                Builtin::CelMatches,
                Builtin::CelSize,
                Builtin::CelHas,
                Builtin::Any,
                Builtin::All,
                Builtin::Int,
            ],
        }
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self { functions: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, builtin: Builtin) -> Self {
        if !self.functions.contains(&builtin) {
            self.functions.push(builtin);
        }
        self
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Builtin> {
        name.parse::<Builtin>().ok().filter(|b| self.functions.contains(b))
    }

    pub fn iter(&self) -> impl Iterator<Item = Builtin> + '_ {
        self.functions.iter().copied()
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Evaluated call arguments.
#[derive(Debug, Default)]
pub(crate) struct Arguments {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Arguments {
    pub(crate) const fn new(positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self { positional, keywords }
    }

    /// Assigns positional and keyword arguments to named parameter slots.
    pub(crate) fn bind<const N: usize>(self, function: &str, params: [&str; N]) -> Result<[Option<Value>; N], EvalError> {
        let given = self.positional.len();
        if given > N {
            return Err(EvalError::type_error(format!(
                "{function}() takes at most {N} argument{} ({given} given)",
                if N == 1 { "" } else { "s" }
            )));
        }

        let mut slots: [Option<Value>; N] = core::array::from_fn(|_| None);
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }

        for (keyword, value) in self.keywords {
            let Some(position) = params.iter().position(|p| *p == keyword) else {
                return Err(EvalError::type_error(format!(
                    "{function}() got an unexpected keyword argument '{keyword}'"
                )));
            };
            let slot = &mut slots[position];
            if slot.is_some() {
                return Err(EvalError::type_error(format!(
                    "{function}() got multiple values for argument '{keyword}'"
                )));
            }
            *slot = Some(value);
        }

        Ok(slots)
    }
}

pub(crate) fn required(slot: Option<Value>, function: &str, param: &str) -> Result<Value, EvalError> {
    slot.ok_or_else(|| EvalError::type_error(format!("{function}() missing required argument '{param}'")))
}

/// Optional integer argument such as `maxsplit` or `count`.
pub(crate) fn optional_int(slot: Option<Value>, function: &str, param: &str) -> Result<Option<i64>, EvalError> {
    match slot {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Int(i)) => Ok(Some(i)),
        Some(Value::Bool(b)) => Ok(Some(i64::from(b))),
        Some(other) => Err(EvalError::type_error(format!(
            "{function}() argument '{param}' must be int, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_int(x: Option<Value>, base: Option<Value>) -> Result<Value, EvalError> {
    let Some(x) = x else {
        return Ok(Value::Int(0));
    };

    if let Some(base) = optional_int(base, "int", "base")? {
        let Value::Str(s) = &x else {
            return Err(EvalError::type_error("int() can't convert non-string with explicit base"));
        };
        return parse_int(s, base);
    }

    match x {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) => float_to_int(f),
        Value::Str(s) => parse_int(&s, 10),
        other => Err(EvalError::type_error(format!(
            "int() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

#[expect(clippy::cast_possible_truncation, reason = "range is checked before the cast")]
fn float_to_int(f: f64) -> Result<Value, EvalError> {
    if f.is_nan() {
        return Err(EvalError::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(EvalError::runtime("OverflowError: cannot convert float infinity to integer"));
    }

    let truncated = f.trunc();
    if !(-9.223_372_036_854_775_808e18..9.223_372_036_854_775_808e18).contains(&truncated) {
        return Err(EvalError::overflow());
    }
    Ok(Value::Int(truncated as i64))
}

fn parse_int(text: &str, base: i64) -> Result<Value, EvalError> {
    let invalid = || EvalError::value_error(format!("invalid literal for int() with base {base}: {}", Value::from(text).repr()));

    let Ok(radix) = u32::try_from(base) else {
        return Err(EvalError::value_error("int() base must be >= 2 and <= 36, or 0"));
    };
    if !(2..=36).contains(&radix) {
        return Err(EvalError::value_error("int() base must be >= 2 and <= 36, or 0"));
    }

    let trimmed = text.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let prefix = match radix {
        16 => Some("0x"),
        8 => Some("0o"),
        2 => Some("0b"),
        _ => None,
    };
    let digits = prefix
        .and_then(|p| digits.get(..2).filter(|d| d.eq_ignore_ascii_case(p)).map(|_| &digits[2..]))
        .unwrap_or(digits);

    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(invalid());
    }

    let cleaned = digits.replace('_', "");
    let magnitude = i64::from_str_radix(&cleaned, radix).map_err(|_| invalid())?;
    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

fn to_float(x: Option<Value>) -> Result<Value, EvalError> {
    match x {
        None => Ok(Value::Float(0.0)),
        Some(Value::Float(f)) => Ok(Value::Float(f)),
        Some(Value::Int(i)) => {
            #[expect(clippy::cast_precision_loss, reason = "matches float() on large integers")]
            let f = i as f64;
            Ok(Value::Float(f))
        }
        Some(Value::Bool(b)) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Some(Value::Str(s)) => {
            let trimmed = s.trim();
            let lower = trimmed.to_ascii_lowercase();
            let unsigned = lower.trim_start_matches(['+', '-']);
            let parsed = match unsigned {
                "inf" | "infinity" => Some(f64::INFINITY),
                "nan" => Some(f64::NAN),
                _ if unsigned.contains(|c: char| c.is_ascii_digit()) => lower.replace('_', "").parse::<f64>().ok(),
                _ => None,
            };
            let parsed = parsed.ok_or_else(|| {
                EvalError::value_error(format!("could not convert string to float: {}", Value::from(s.as_str()).repr()))
            })?;
            Ok(Value::Float(if lower.starts_with('-') && !parsed.is_sign_negative() { -parsed } else { parsed }))
        }
        Some(other) => Err(EvalError::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_dict(args: Arguments) -> Result<Value, EvalError> {
    if args.positional.len() > 1 {
        return Err(EvalError::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.positional.len()
        )));
    }

    let mut out = BTreeMap::new();
    if let Some(source) = args.positional.into_iter().next() {
        if let Value::Map(map) = source {
            out = map;
        } else {
            for (position, item) in source.iterate()?.into_iter().enumerate() {
                let (Value::List(pair) | Value::Tuple(pair)) = item else {
                    return Err(EvalError::type_error(format!(
                        "cannot convert dictionary update sequence element #{position} to a sequence"
                    )));
                };
                let [key, value]: [Value; 2] = pair.try_into().map_err(|pair: Vec<Value>| {
                    EvalError::value_error(format!(
                        "dictionary update sequence element #{position} has length {}; 2 is required",
                        pair.len()
                    ))
                })?;
                let Value::Str(key) = key else {
                    return Err(EvalError::type_error(format!("mapping keys must be strings, not '{}'", key.type_name())));
                };
                _ = out.insert(key, value);
            }
        }
    }

    for (key, value) in args.keywords {
        _ = out.insert(key, value);
    }
    Ok(Value::Map(out))
}

/// Shared body of `min` and `max`: keeps the first element that is strictly
/// more extreme than the current pick.
fn extreme(name: &str, args: Arguments, wanted: Ordering) -> Result<Value, EvalError> {
    let mut default = None;
    for (keyword, value) in args.keywords {
        if keyword == "default" {
            default = Some(value);
        } else {
            return Err(EvalError::type_error(format!("{name}() got an unexpected keyword argument '{keyword}'")));
        }
    }

    let candidates = match args.positional.len() {
        0 => return Err(EvalError::type_error(format!("{name} expected at least 1 argument, got 0"))),
        1 => args.positional.into_iter().next().map(|v| v.iterate()).transpose()?.unwrap_or_default(),
        _ if default.is_some() => {
            return Err(EvalError::type_error(format!(
                "Cannot specify a default for {name}() with multiple positional arguments"
            )));
        }
        _ => args.positional,
    };

    let symbol = if wanted == Ordering::Less { "<" } else { ">" };
    let mut best: Option<Value> = None;
    for candidate in candidates {
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if candidate.compare(&current, symbol)? == Some(wanted) {
                    candidate
                } else {
                    current
                }
            }
        });
    }

    best.or(default)
        .ok_or_else(|| EvalError::value_error(format!("{name}() iterable argument is empty")))
}

/// Stable sort with fallible comparisons.
pub(crate) fn sort_values(items: &mut [Value], reverse: bool) -> Result<(), EvalError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        let (x, y) = if reverse { (b, a) } else { (a, b) };
        match x.compare(y, "<") {
            Ok(ordering) => ordering.unwrap_or(Ordering::Equal),
            Err(e) => {
                _ = failure.get_or_insert(e);
                Ordering::Equal
            }
        }
    });
    failure.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(builtin: Builtin, positional: Vec<Value>) -> Result<Value, EvalError> {
        builtin.call(Arguments::new(positional, Vec::new()))
    }

    #[test]
    fn test_names_round_trip() {
        for builtin in Builtin::iter() {
            assert_eq!(builtin.name().parse::<Builtin>().unwrap(), builtin);
        }
        assert_eq!(Builtin::CelMatches.name(), "cel_matches");
    }

    #[test]
    fn test_tables() {
        let standard = FunctionTable::standard();
        assert_eq!(standard.iter().count(), 16);
        assert_eq!(standard.resolve("len"), Some(Builtin::Len));
        assert_eq!(standard.resolve("cel_has"), None);
        assert_eq!(standard.resolve("eval"), None);

        let cel = FunctionTable::cel();
        assert_eq!(cel.resolve("cel_size"), Some(Builtin::CelSize));
        assert_eq!(cel.resolve("len"), None);
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(call(Builtin::Int, vec![Value::from("100")]).unwrap(), Value::Int(100));
        assert_eq!(call(Builtin::Int, vec![Value::from(" -7 ")]).unwrap(), Value::Int(-7));
        assert_eq!(call(Builtin::Int, vec![Value::Float(-3.9)]).unwrap(), Value::Int(-3));
        assert_eq!(call(Builtin::Int, vec![Value::from("ff"), Value::Int(16)]).unwrap(), Value::Int(255));
        assert_eq!(
            call(Builtin::Int, vec![Value::from("abc")]).unwrap_err().to_string(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        assert!(call(Builtin::Int, vec![Value::Float(f64::NAN)]).is_err());
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(call(Builtin::Float, vec![Value::from("1e3")]).unwrap(), Value::Float(1000.0));
        assert!(matches!(call(Builtin::Float, vec![Value::from("-inf")]).unwrap(), Value::Float(f) if f == f64::NEG_INFINITY));
        assert!(call(Builtin::Float, vec![Value::from("x")]).is_err());
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call(Builtin::Max, vec![Value::Int(1), Value::Int(5), Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(call(Builtin::Min, vec![Value::from(vec![4, 2, 8])]).unwrap(), Value::Int(2));
        assert_eq!(
            call(Builtin::Max, vec![Value::List(vec![])]).unwrap_err().to_string(),
            "ValueError: max() iterable argument is empty"
        );
        let with_default = Builtin::Max.call(Arguments::new(
            vec![Value::List(vec![])],
            vec![("default".to_string(), Value::Int(0))],
        ));
        assert_eq!(with_default.unwrap(), Value::Int(0));
    }

    #[test]
    fn test_sum_and_abs() {
        assert_eq!(call(Builtin::Sum, vec![Value::from(vec![1, 2, 3])]).unwrap(), Value::Int(6));
        assert_eq!(call(Builtin::Sum, vec![Value::from(vec![0.5, 0.25])]).unwrap(), Value::Float(0.75));
        assert_eq!(call(Builtin::Abs, vec![Value::Int(-5)]).unwrap(), Value::Int(5));
        assert!(call(Builtin::Sum, vec![Value::from(vec!["a"]), Value::from("")]).is_err());
    }

    #[test]
    fn test_sorted_and_reversed() {
        let sorted = Builtin::Sorted.call(Arguments::new(
            vec![Value::from(vec![3, 1, 2])],
            vec![("reverse".to_string(), Value::Bool(true))],
        ));
        assert_eq!(sorted.unwrap(), Value::from(vec![3, 2, 1]));
        assert_eq!(call(Builtin::Reversed, vec![Value::from("ab")]).unwrap(), Value::from(vec!["b", "a"]));
        assert!(call(Builtin::Sorted, vec![Value::from(vec![Value::Int(1), Value::from("a")])]).is_err());
    }

    #[test]
    fn test_dict_from_pairs_and_keywords() {
        let pairs = Value::List(vec![Value::Tuple(vec![Value::from("a"), Value::Int(1)])]);
        let dict = Builtin::Dict
            .call(Arguments::new(vec![pairs], vec![("b".to_string(), Value::Int(2))]))
            .unwrap();
        let Value::Map(map) = dict else { panic!("expected a map") };
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"], Value::Int(2));
    }

    #[test]
    fn test_argument_binding_errors() {
        assert_eq!(
            call(Builtin::Len, vec![Value::Int(1), Value::Int(2)]).unwrap_err().to_string(),
            "TypeError: len() takes at most 1 argument (2 given)"
        );
        assert_eq!(
            call(Builtin::Len, vec![]).unwrap_err().to_string(),
            "TypeError: len() missing required argument 'obj'"
        );
        let unexpected = Builtin::Len.call(Arguments::new(vec![], vec![("x".to_string(), Value::Null)]));
        assert_eq!(
            unexpected.unwrap_err().to_string(),
            "TypeError: len() got an unexpected keyword argument 'x'"
        );
        assert_eq!(
            call(Builtin::Len, vec![Value::Int(3)]).unwrap_err().to_string(),
            "TypeError: object of type 'int' has no len()"
        );
    }
}
