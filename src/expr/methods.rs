//! Allow-listed methods on strings, mappings, and lists.
//!
//! Attribute access on a value never reflects over arbitrary properties. Each
//! value kind has a closed table of method names, and a successful lookup
//! yields a [`BoundMethod`] pairing the method with a copy of its receiver.

use super::functions::{Arguments, optional_int, required};
use super::{EvalError, Value};
use strum::{EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum StrMethod {
    StartsWith,
    EndsWith,
    Lower,
    Upper,
    Strip,
    LStrip,
    RStrip,
    Split,
    Join,
    Replace,
    Find,
    Count,
    IsDigit,
    IsAlpha,
    IsAlnum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum MapMethod {
    Get,
    Keys,
    Values,
    Items,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ListMethod {
    Append,
    Extend,
    Index,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Str(StrMethod),
    Map(MapMethod),
    List(ListMethod),
}

impl Method {
    /// Finds the allow-listed method `attr` for the kind of `receiver`.
    #[must_use]
    pub fn lookup(receiver: &Value, attr: &str) -> Option<Self> {
        match receiver {
            Value::Str(_) => attr.parse().ok().map(Self::Str),
            Value::Map(_) => attr.parse().ok().map(Self::Map),
            Value::List(_) => attr.parse().ok().map(Self::List),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Str(m) => m.into(),
            Self::Map(m) => m.into(),
            Self::List(m) => m.into(),
        }
    }
}

/// A method together with the value it was accessed on.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundMethod {
    receiver: Value,
    method: Method,
}

impl BoundMethod {
    pub(crate) const fn new(receiver: Value, method: Method) -> Self {
        Self { receiver, method }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.method.name()
    }

    #[must_use]
    pub const fn receiver_type(&self) -> &'static str {
        self.receiver.type_name()
    }

    pub(crate) fn call(&self, args: Arguments) -> Result<Value, EvalError> {
        match (&self.receiver, self.method) {
            (Value::Str(s), Method::Str(method)) => call_str(s, method, args),
            (Value::Map(map), Method::Map(method)) => call_map(map, method, args),
            (Value::List(items), Method::List(method)) => call_list(items, method, args),
            _ => Err(EvalError::AttributeAccess {
                attr: self.name().to_string(),
                type_name: self.receiver.type_name(),
            }),
        }
    }
}

fn string_arg(value: Value, function: &str, param: &str) -> Result<String, EvalError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::type_error(format!(
            "{function}() argument '{param}' must be str, not '{}'",
            other.type_name()
        ))),
    }
}

/// Resolves optional `start`/`end` character positions against `s`, returning
/// the character offset of the window and the window itself.
fn window<'a>(s: &'a str, start: Option<i64>, end: Option<i64>) -> (usize, &'a str) {
    let len = s.chars().count();
    let resolve = |position: i64| -> usize {
        let len_i64 = i64::try_from(len).unwrap_or(i64::MAX);
        let p = if position < 0 { (position + len_i64).max(0) } else { position.min(len_i64) };
        usize::try_from(p).unwrap_or(0)
    };

    let start = start.map_or(0, resolve);
    let end = end.map_or(len, resolve).max(start);
    let byte_at = |chars: usize| s.char_indices().nth(chars).map_or(s.len(), |(b, _)| b);
    (start, s.get(byte_at(start)..byte_at(end)).unwrap_or_default())
}

fn affix_matches(s: &str, affix: Value, name: &str, test: fn(&str, &str) -> bool) -> Result<bool, EvalError> {
    match affix {
        Value::Str(a) => Ok(test(s, &a)),
        Value::Tuple(options) => {
            for option in options {
                match option {
                    Value::Str(a) if test(s, &a) => return Ok(true),
                    Value::Str(_) => {}
                    other => {
                        return Err(EvalError::type_error(format!(
                            "tuple for {name} must only contain str, not '{}'",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(false)
        }
        other => Err(EvalError::type_error(format!(
            "{name} first arg must be str or a tuple of str, not '{}'",
            other.type_name()
        ))),
    }
}

fn strip_chars(chars: Option<Value>, name: &str) -> Result<Option<Vec<char>>, EvalError> {
    match chars {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(string_arg(value, name, "chars")?.chars().collect())),
    }
}

fn split(s: &str, sep: Option<&str>, maxsplit: Option<i64>) -> Result<Vec<Value>, EvalError> {
    let limit = maxsplit.and_then(|m| usize::try_from(m).ok());

    let Some(sep) = sep else {
        let Some(limit) = limit else {
            return Ok(s.split_whitespace().map(Value::from).collect());
        };

        let mut parts = Vec::new();
        let mut rest = s.trim_start();
        while !rest.is_empty() && parts.len() < limit {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            parts.push(Value::from(&rest[..end]));
            rest = rest[end..].trim_start();
        }
        if !rest.is_empty() {
            parts.push(Value::from(rest));
        }
        return Ok(parts);
    };

    if sep.is_empty() {
        return Err(EvalError::value_error("empty separator"));
    }

    Ok(match limit {
        Some(limit) => s.splitn(limit + 1, sep).map(Value::from).collect(),
        None => s.split(sep).map(Value::from).collect(),
    })
}

fn call_str(s: &str, method: StrMethod, args: Arguments) -> Result<Value, EvalError> {
    let name: &'static str = method.into();
    match method {
        StrMethod::StartsWith | StrMethod::EndsWith => {
            let [affix, start, end] = args.bind(name, ["prefix", "start", "end"])?;
            let affix = required(affix, name, "prefix")?;
            let (_, target) = window(s, optional_int(start, name, "start")?, optional_int(end, name, "end")?);
            let test: fn(&str, &str) -> bool = if method == StrMethod::StartsWith {
                |s, a| s.starts_with(a)
            } else {
                |s, a| s.ends_with(a)
            };
            affix_matches(target, affix, name, test).map(Value::Bool)
        }
        StrMethod::Lower => {
            let [] = args.bind(name, [])?;
            Ok(Value::Str(s.to_lowercase()))
        }
        StrMethod::Upper => {
            let [] = args.bind(name, [])?;
            Ok(Value::Str(s.to_uppercase()))
        }
        StrMethod::Strip | StrMethod::LStrip | StrMethod::RStrip => {
            let [chars] = args.bind(name, ["chars"])?;
            let chars = strip_chars(chars, name)?;
            let matcher = |c: char| chars.as_ref().map_or_else(|| c.is_whitespace(), |set| set.contains(&c));
            let stripped = match method {
                StrMethod::LStrip => s.trim_start_matches(matcher),
                StrMethod::RStrip => s.trim_end_matches(matcher),
                _ => s.trim_matches(matcher),
            };
            Ok(Value::from(stripped))
        }
        StrMethod::Split => {
            let [sep, maxsplit] = args.bind(name, ["sep", "maxsplit"])?;
            let sep = match sep {
                None | Some(Value::Null) => None,
                Some(value) => Some(string_arg(value, name, "sep")?),
            };
            let maxsplit = optional_int(maxsplit, name, "maxsplit")?.filter(|m| *m >= 0);
            split(s, sep.as_deref(), maxsplit).map(Value::List)
        }
        StrMethod::Join => {
            let [iterable] = args.bind(name, ["iterable"])?;
            let items = required(iterable, name, "iterable")?.iterate()?;
            let mut parts = Vec::with_capacity(items.len());
            for (position, item) in items.into_iter().enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(EvalError::type_error(format!(
                            "sequence item {position}: expected str instance, {} found",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(parts.join(s)))
        }
        StrMethod::Replace => {
            let [old, new, count] = args.bind(name, ["old", "new", "count"])?;
            let old = string_arg(required(old, name, "old")?, name, "old")?;
            let new = string_arg(required(new, name, "new")?, name, "new")?;
            let replaced = match optional_int(count, name, "count")?.and_then(|c| usize::try_from(c).ok()) {
                Some(count) => s.replacen(&old, &new, count),
                None => s.replace(&old, &new),
            };
            Ok(Value::Str(replaced))
        }
        StrMethod::Find => {
            let [sub, start, end] = args.bind(name, ["sub", "start", "end"])?;
            let sub = string_arg(required(sub, name, "sub")?, name, "sub")?;
            let (offset, target) = window(s, optional_int(start, name, "start")?, optional_int(end, name, "end")?);
            Ok(Value::Int(target.find(&sub).map_or(-1, |byte| {
                let chars = offset + target[..byte].chars().count();
                i64::try_from(chars).unwrap_or(i64::MAX)
            })))
        }
        StrMethod::Count => {
            let [sub, start, end] = args.bind(name, ["sub", "start", "end"])?;
            let sub = string_arg(required(sub, name, "sub")?, name, "sub")?;
            let (_, target) = window(s, optional_int(start, name, "start")?, optional_int(end, name, "end")?);
            Ok(Value::Int(i64::try_from(target.matches(sub.as_str()).count()).unwrap_or(i64::MAX)))
        }
        StrMethod::IsDigit | StrMethod::IsAlpha | StrMethod::IsAlnum => {
            let [] = args.bind(name, [])?;
            let test: fn(char) -> bool = match method {
                StrMethod::IsDigit => char::is_numeric,
                StrMethod::IsAlpha => char::is_alphabetic,
                _ => char::is_alphanumeric,
            };
            Ok(Value::Bool(!s.is_empty() && s.chars().all(test)))
        }
    }
}

fn call_map(map: &std::collections::BTreeMap<String, Value>, method: MapMethod, args: Arguments) -> Result<Value, EvalError> {
    let name: &'static str = method.into();
    match method {
        MapMethod::Get => {
            let [key, default] = args.bind(name, ["key", "default"])?;
            let key = required(key, name, "key")?;
            if !key.is_hashable() {
                return Err(EvalError::type_error(format!("unhashable type: '{}'", key.type_name())));
            }
            Ok(key
                .as_str()
                .and_then(|k| map.get(k).cloned())
                .unwrap_or_else(|| default.unwrap_or(Value::Null)))
        }
        MapMethod::Keys => {
            let [] = args.bind(name, [])?;
            Ok(Value::List(map.keys().map(|k| Value::Str(k.clone())).collect()))
        }
        MapMethod::Values => {
            let [] = args.bind(name, [])?;
            Ok(Value::List(map.values().cloned().collect()))
        }
        MapMethod::Items => {
            let [] = args.bind(name, [])?;
            Ok(Value::List(
                map.iter()
                    .map(|(k, v)| Value::Tuple(vec![Value::Str(k.clone()), v.clone()]))
                    .collect(),
            ))
        }
    }
}

/// List methods observe the receiver but never change it: `append` and
/// `extend` validate their input and return null, as their in-place forms do.
fn call_list(items: &[Value], method: ListMethod, args: Arguments) -> Result<Value, EvalError> {
    let name: &'static str = method.into();
    match method {
        ListMethod::Append => {
            let [object] = args.bind(name, ["object"])?;
            _ = required(object, name, "object")?;
            Ok(Value::Null)
        }
        ListMethod::Extend => {
            let [iterable] = args.bind(name, ["iterable"])?;
            _ = required(iterable, name, "iterable")?.iterate()?;
            Ok(Value::Null)
        }
        ListMethod::Index => {
            let [value, start, end] = args.bind(name, ["value", "start", "end"])?;
            let value = required(value, name, "value")?;
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let clamp = |p: i64| if p < 0 { (p + len).max(0) } else { p.min(len) };
            let start = optional_int(start, name, "start")?.map_or(0, clamp);
            let end = optional_int(end, name, "end")?.map_or(len, clamp);

            items
                .iter()
                .enumerate()
                .filter(|(position, _)| {
                    let position = i64::try_from(*position).unwrap_or(i64::MAX);
                    position >= start && position < end
                })
                .find(|(_, item)| **item == value)
                .map(|(position, _)| Value::Int(i64::try_from(position).unwrap_or(i64::MAX)))
                .ok_or_else(|| EvalError::value_error(format!("{} is not in list", value.repr())))
        }
        ListMethod::Count => {
            let [value] = args.bind(name, ["value"])?;
            let value = required(value, name, "value")?;
            Ok(Value::Int(
                i64::try_from(items.iter().filter(|item| **item == value).count()).unwrap_or(i64::MAX),
            ))
        }
    }
}
