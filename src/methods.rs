//! Indexing, property access and the built-in methods of each value kind.

use crate::{
    diagnostics::Diagnostic,
    environment::EnvironmentRef,
    runtime::{Eval, Interpreter},
    value::{HashKey, HashPair, Value, ValueKind},
};

impl Interpreter {
    /// `receiver.name(args)`.
    pub(crate) fn call_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Eval<Value> {
        match receiver.kind() {
            ValueKind::Instance(instance) => {
                let attribute = instance.attributes.borrow().get(name).cloned();
                if let Some(attribute) = attribute.filter(is_callable) {
                    return self.apply(&attribute, args);
                }
                match instance.class.methods.get(name) {
                    Some(method) => {
                        let method = method.clone();
                        self.call_function(&method, args, Some(receiver))
                    }
                    None => Err(Diagnostic::runtime(format!("undefined method: {name}")).into()),
                }
            }
            ValueKind::Module(module) => {
                let member = module_member(&module.env, &module.name, name)?;
                self.apply(&member, args)
            }
            ValueKind::Hash(pairs) => {
                let stored = Value::string(name)
                    .hash_key()
                    .and_then(|key| pairs.borrow().get(&key).map(|pair| pair.value.clone()));
                match stored {
                    Some(function) if is_callable(&function) => self.apply(&function, args),
                    _ => Ok(hash_method(receiver, name, &args)?),
                }
            }
            ValueKind::Array(_) => self.array_method(receiver, name, args),
            ValueKind::String(text) => Ok(string_method(text, name, &args)?),
            _ => Err(Diagnostic::runtime(format!(
                "undefined method {name} for {}",
                receiver.type_name()
            ))
            .into()),
        }
    }

    fn array_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Eval<Value> {
        let ValueKind::Array(cell) = receiver.kind() else {
            return Err(Diagnostic::runtime("expected an array receiver").into());
        };
        let items = cell.borrow().clone();
        let value = match (name, args.as_slice()) {
            ("len", []) => Value::integer(items.len() as i64),
            ("push", [item]) => {
                let mut items = items;
                items.push(item.clone());
                Value::array(items)
            }
            ("pop", []) => {
                let mut items = items;
                items.pop();
                Value::array(items)
            }
            ("rest", []) => match items.split_first() {
                Some((_, rest)) => Value::array(rest.to_vec()),
                None => Value::null(),
            },
            ("first", []) => items.first().cloned().unwrap_or_else(Value::null),
            ("last", []) => items.last().cloned().unwrap_or_else(Value::null),
            ("reverse", []) => Value::array(items.into_iter().rev().collect()),
            ("contains", [needle]) => Value::boolean(
                items
                    .iter()
                    .any(|item| crate::operators::values_equal(item, needle)),
            ),
            ("join", [separator]) => {
                let ValueKind::String(separator) = separator.kind() else {
                    return Err(type_error("join", separator).into());
                };
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                Value::string(parts.join(separator))
            }
            ("filter", [predicate]) => {
                let mut kept = Vec::new();
                for item in items {
                    if self.apply(predicate, vec![item.clone()])?.is_truthy() {
                        kept.push(item);
                    }
                }
                Value::array(kept)
            }
            ("map", [mapper]) => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(self.apply(mapper, vec![item])?);
                }
                Value::array(mapped)
            }
            ("len" | "pop" | "rest" | "first" | "last" | "reverse", _)
            | ("push" | "contains" | "join" | "filter" | "map", _) => {
                return Err(method_arity(name, args.len()).into())
            }
            _ => return Err(Diagnostic::runtime(format!("undefined method {name} for ARRAY")).into()),
        };
        Ok(value)
    }
}

fn is_callable(value: &Value) -> bool {
    matches!(
        value.kind(),
        ValueKind::Function(_) | ValueKind::Builtin(_) | ValueKind::Class(_)
    )
}

fn type_error(method: &str, value: &Value) -> Diagnostic {
    Diagnostic::runtime(format!(
        "argument to `{method}` not supported, got {}",
        value.type_name()
    ))
}

fn method_arity(method: &str, got: usize) -> Diagnostic {
    Diagnostic::runtime(format!("wrong number of arguments to `{method}`: got={got}"))
}

fn expect_str<'a>(method: &str, value: &'a Value) -> Result<&'a str, Diagnostic> {
    match value.kind() {
        ValueKind::String(s) => Ok(s),
        _ => Err(type_error(method, value)),
    }
}

fn expect_int(method: &str, value: &Value) -> Result<i64, Diagnostic> {
    match value.kind() {
        ValueKind::Integer(n) => Ok(*n),
        _ => Err(type_error(method, value)),
    }
}

fn string_method(text: &str, name: &str, args: &[Value]) -> Result<Value, Diagnostic> {
    let value = match (name, args) {
        ("len", []) => Value::integer(text.chars().count() as i64),
        ("upper", []) => Value::string(text.to_uppercase()),
        ("lower", []) => Value::string(text.to_lowercase()),
        ("trim", []) => Value::string(text.trim()),
        ("chars", []) => Value::array(text.chars().map(Value::string).collect()),
        ("split", [separator]) => {
            let separator = expect_str(name, separator)?;
            let parts: Vec<Value> = if separator.is_empty() {
                text.chars().map(Value::string).collect()
            } else {
                text.split(separator).map(Value::string).collect()
            };
            Value::array(parts)
        }
        ("contains", [part]) => Value::boolean(text.contains(expect_str(name, part)?)),
        ("starts_with", [part]) => Value::boolean(text.starts_with(expect_str(name, part)?)),
        ("ends_with", [part]) => Value::boolean(text.ends_with(expect_str(name, part)?)),
        ("append", [part]) => Value::string(format!("{text}{}", expect_str(name, part)?)),
        ("replace", [from, to]) => {
            Value::string(text.replace(expect_str(name, from)?, expect_str(name, to)?))
        }
        ("substr", [start]) => substring(text, expect_int(name, start)?, None),
        ("substr", [start, len]) => {
            substring(text, expect_int(name, start)?, Some(expect_int(name, len)?))
        }
        ("len" | "upper" | "lower" | "trim" | "chars", _)
        | ("split" | "contains" | "starts_with" | "ends_with" | "append", _)
        | ("replace" | "substr", _) => return Err(method_arity(name, args.len())),
        _ => {
            return Err(Diagnostic::runtime(format!(
                "undefined method {name} for STRING"
            )))
        }
    };
    Ok(value)
}

/// Code-point substring; out-of-range bounds are clamped.
fn substring(text: &str, start: i64, len: Option<i64>) -> Value {
    let count = text.chars().count();
    let start = usize::try_from(start.max(0)).unwrap_or(0).min(count);
    let take = match len {
        Some(len) => usize::try_from(len.max(0)).unwrap_or(0),
        None => count,
    };
    Value::string(text.chars().skip(start).take(take).collect::<String>())
}

fn hash_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, Diagnostic> {
    let ValueKind::Hash(cell) = receiver.kind() else {
        return Err(Diagnostic::runtime("expected a hash receiver"));
    };
    let pairs = cell.borrow();
    let value = match (name, args) {
        ("keys", []) => Value::array(pairs.values().map(|pair| pair.key.clone()).collect()),
        ("values", []) => Value::array(pairs.values().map(|pair| pair.value.clone()).collect()),
        ("len", []) => Value::integer(pairs.len() as i64),
        ("has", [key]) => Value::boolean(pairs.contains_key(&hash_key(key)?)),
        ("delete", [key]) => {
            let key = hash_key(key)?;
            let mut copy = pairs.clone();
            copy.shift_remove(&key);
            Value::hash(copy)
        }
        ("keys" | "values" | "len", _) | ("has" | "delete", _) => {
            return Err(method_arity(name, args.len()))
        }
        _ => return Err(Diagnostic::runtime(format!("undefined method {name} for HASH"))),
    };
    Ok(value)
}

fn hash_key(key: &Value) -> Result<HashKey, Diagnostic> {
    key.hash_key()
        .ok_or_else(|| Diagnostic::runtime(format!("unusable as hash key: {}", key.type_name())))
}

/// Resolves an index against a sequence of `len` elements. Integers count
/// from the front, or from the back when negative; a float in `[0, 1]`
/// picks the element at that fraction of the length.
fn resolve_position(index: &Value, len: usize) -> Result<usize, Diagnostic> {
    let out_of_range = || Diagnostic::runtime(format!("index out of range: {index}"));
    match index.kind() {
        ValueKind::Integer(n) => {
            let n = *n;
            let resolved = if n < 0 { len as i64 + n } else { n };
            if resolved < 0 || resolved >= len as i64 {
                return Err(out_of_range());
            }
            Ok(resolved as usize)
        }
        ValueKind::Float(f) if (0.0..=1.0).contains(f) && len > 0 => {
            let position = (len as f64 * f).floor() as usize;
            Ok(position.min(len - 1))
        }
        ValueKind::Float(_) => Err(out_of_range()),
        _ => Err(Diagnostic::runtime(format!(
            "index operator not supported: {}",
            index.type_name()
        ))),
    }
}

pub(crate) fn index(target: &Value, index: &Value) -> Result<Value, Diagnostic> {
    match target.kind() {
        ValueKind::Array(items) => {
            let items = items.borrow();
            let position = resolve_position(index, items.len())?;
            Ok(items[position].clone())
        }
        ValueKind::String(text) => {
            let position = resolve_position(index, text.chars().count())?;
            Ok(text
                .chars()
                .nth(position)
                .map(Value::string)
                .unwrap_or_else(Value::null))
        }
        ValueKind::Hash(pairs) => {
            let key = hash_key(index)?;
            pairs
                .borrow()
                .get(&key)
                .map(|pair| pair.value.clone())
                .ok_or_else(|| Diagnostic::runtime("key not found"))
        }
        _ => Err(Diagnostic::runtime(format!(
            "index operator not supported: {}",
            target.type_name()
        ))),
    }
}

pub(crate) fn assign_index(target: &Value, index: &Value, value: Value) -> Result<(), Diagnostic> {
    match target.kind() {
        ValueKind::Array(items) => {
            let mut items = items.borrow_mut();
            let position = resolve_position(index, items.len())?;
            items[position] = value;
            Ok(())
        }
        ValueKind::Hash(pairs) => {
            let key = hash_key(index)?;
            pairs.borrow_mut().insert(
                key,
                HashPair {
                    key: index.clone(),
                    value,
                },
            );
            Ok(())
        }
        _ => Err(Diagnostic::runtime(format!(
            "index assignment not supported on {}",
            target.type_name()
        ))),
    }
}

pub(crate) fn property(object: &Value, name: &str) -> Result<Value, Diagnostic> {
    match object.kind() {
        ValueKind::Instance(instance) => {
            if let Some(attribute) = instance.attributes.borrow().get(name) {
                return Ok(attribute.clone());
            }
            instance
                .class
                .methods
                .get(name)
                .map(|method| Value::new(ValueKind::Function(method.clone())))
                .ok_or_else(|| {
                    Diagnostic::runtime(format!(
                        "undefined property {name} on instance of {}",
                        instance.class.name
                    ))
                })
        }
        ValueKind::Hash(pairs) => {
            let key = hash_key(&Value::string(name))?;
            Ok(pairs
                .borrow()
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or_else(Value::null))
        }
        ValueKind::Module(module) => module_member(&module.env, &module.name, name),
        ValueKind::Error(message) if name == "message" => Ok(Value::string(message.clone())),
        _ => Err(Diagnostic::runtime(format!(
            "property access not supported on {}",
            object.type_name()
        ))),
    }
}

pub(crate) fn assign_property(object: &Value, name: &str, value: Value) -> Result<(), Diagnostic> {
    match object.kind() {
        ValueKind::Instance(instance) => {
            instance
                .attributes
                .borrow_mut()
                .insert(name.to_string(), value);
            Ok(())
        }
        ValueKind::Hash(_) => assign_index(object, &Value::string(name), value),
        _ => Err(Diagnostic::runtime(format!(
            "property assignment not supported on {}",
            object.type_name()
        ))),
    }
}

/// Members of a module environment, used by `@name(a, b)` imports.
pub(crate) fn module_member(
    env: &EnvironmentRef,
    module: &str,
    name: &str,
) -> Result<Value, Diagnostic> {
    env.borrow().get_local(name).ok_or_else(|| {
        Diagnostic::runtime(format!("undefined member {name} in module {module}"))
    })
}
