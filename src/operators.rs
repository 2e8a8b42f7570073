//! Operator dispatch over pairs of value kinds.
//!
//! Every supported `(left, right, operator)` combination is spelled out in a
//! match; anything not listed falls back to identity for `==`/`!=` and is an
//! "unknown operator" error otherwise.

use crate::{
    ast::{InfixOp, PrefixOp},
    diagnostics::Diagnostic,
    value::{Value, ValueKind},
};

type OpResult = Result<Value, Diagnostic>;

pub fn prefix(op: PrefixOp, right: &Value) -> OpResult {
    match (op, right.kind()) {
        (PrefixOp::Not, _) => Ok(Value::boolean(!right.is_truthy())),
        (PrefixOp::Negate, ValueKind::Integer(n)) => Ok(Value::integer(n.wrapping_neg())),
        (PrefixOp::Negate, ValueKind::Float(f)) => Ok(Value::float(-f)),
        (PrefixOp::Sqrt, ValueKind::Integer(_) | ValueKind::Float(_)) => square_root(right),
        _ => Err(Diagnostic::runtime(format!(
            "unknown operator: {op}{}",
            right.type_name()
        ))),
    }
}

pub fn infix(op: InfixOp, left: &Value, right: &Value) -> OpResult {
    use ValueKind as K;

    match op {
        InfixOp::In => return membership(left, right),
        InfixOp::Concat => return concat(left, right),
        InfixOp::Range | InfixOp::RangeInclusive => return range(op, left, right),
        // `a $ b` is the square root of `b`; the left operand only selects
        // the operator.
        InfixOp::Sqrt if is_number(left) && is_number(right) => return square_root(right),
        _ => {}
    }

    match (left.kind(), right.kind()) {
        (K::Integer(a), K::Integer(b)) => integers(op, *a, *b),
        (K::Float(a), K::Float(b)) => floats(op, *a, *b),
        (K::Integer(a), K::Float(b)) => floats(op, *a as f64, *b),
        (K::Float(a), K::Integer(b)) => floats(op, *a, *b as f64),
        (K::String(a), K::String(b)) => strings(op, a, b),
        (K::Boolean(a), K::Boolean(b)) => booleans(op, *a, *b),
        (K::Boolean(a), K::Integer(b)) => mixed_boolean(op, i64::from(*a), *b)
            .ok_or_else(|| unknown(op, left, right))?,
        (K::Integer(a), K::Boolean(b)) => mixed_boolean(op, *a, i64::from(*b))
            .ok_or_else(|| unknown(op, left, right))?,
        _ => match op {
            InfixOp::Equal => Ok(Value::boolean(left.is_same(right))),
            InfixOp::NotEqual => Ok(Value::boolean(!left.is_same(right))),
            _ => Err(unknown(op, left, right)),
        },
    }
}

/// `==` as the language defines it, collapsed to a host boolean.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    matches!(
        infix(InfixOp::Equal, left, right).as_ref().map(Value::kind),
        Ok(ValueKind::Boolean(true))
    )
}

fn unknown(op: InfixOp, left: &Value, right: &Value) -> Diagnostic {
    Diagnostic::runtime(format!(
        "unknown operator: {} {op} {}",
        left.type_name(),
        right.type_name()
    ))
}

fn is_number(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Integer(_) | ValueKind::Float(_))
}

fn square_root(value: &Value) -> OpResult {
    let radicand = match value.kind() {
        ValueKind::Integer(n) => *n as f64,
        ValueKind::Float(f) => *f,
        _ => {
            return Err(Diagnostic::runtime(format!(
                "unknown operator: ${}",
                value.type_name()
            )))
        }
    };
    if radicand < 0.0 {
        return Err(Diagnostic::runtime("square root of negative number"));
    }
    Ok(Value::float(radicand.sqrt()))
}

fn integer_power(base: i64, exponent: i64) -> i64 {
    if let Ok(exp) = u32::try_from(exponent) {
        if let Some(result) = base.checked_pow(exp) {
            return result;
        }
    }
    (base as f64).powf(exponent as f64).trunc() as i64
}

fn integers(op: InfixOp, a: i64, b: i64) -> OpResult {
    let value = match op {
        InfixOp::Add => Value::integer(a.wrapping_add(b)),
        InfixOp::Sub => Value::integer(a.wrapping_sub(b)),
        InfixOp::Mul => Value::integer(a.wrapping_mul(b)),
        InfixOp::Div => {
            if b == 0 {
                return Err(Diagnostic::runtime("division by zero"));
            }
            Value::integer(a.wrapping_div(b))
        }
        InfixOp::Mod => {
            if b == 0 {
                return Err(Diagnostic::runtime("modulo by zero"));
            }
            Value::integer(a.wrapping_rem(b))
        }
        InfixOp::Pow => Value::integer(integer_power(a, b)),
        InfixOp::Less => Value::boolean(a < b),
        InfixOp::Greater => Value::boolean(a > b),
        InfixOp::LessEqual => Value::boolean(a <= b),
        InfixOp::GreaterEqual => Value::boolean(a >= b),
        InfixOp::Equal => Value::boolean(a == b),
        InfixOp::NotEqual => Value::boolean(a != b),
        InfixOp::And => Value::boolean(a != 0 && b != 0),
        InfixOp::Or => Value::boolean(a != 0 || b != 0),
        _ => {
            return Err(unknown(op, &Value::integer(a), &Value::integer(b)));
        }
    };
    Ok(value)
}

fn floats(op: InfixOp, a: f64, b: f64) -> OpResult {
    let value = match op {
        InfixOp::Add => Value::float(a + b),
        InfixOp::Sub => Value::float(a - b),
        InfixOp::Mul => Value::float(a * b),
        InfixOp::Div => {
            if b == 0.0 {
                return Err(Diagnostic::runtime("division by zero"));
            }
            Value::float(a / b)
        }
        InfixOp::Mod => {
            if b == 0.0 {
                return Err(Diagnostic::runtime("modulo by zero"));
            }
            Value::float(a % b)
        }
        InfixOp::Pow => Value::float(a.powf(b)),
        InfixOp::Less => Value::boolean(a < b),
        InfixOp::Greater => Value::boolean(a > b),
        InfixOp::LessEqual => Value::boolean(a <= b),
        InfixOp::GreaterEqual => Value::boolean(a >= b),
        InfixOp::Equal => Value::boolean(a == b),
        InfixOp::NotEqual => Value::boolean(a != b),
        InfixOp::And => Value::boolean(a != 0.0 && b != 0.0),
        InfixOp::Or => Value::boolean(a != 0.0 || b != 0.0),
        _ => return Err(unknown(op, &Value::float(a), &Value::float(b))),
    };
    Ok(value)
}

fn strings(op: InfixOp, a: &str, b: &str) -> OpResult {
    let value = match op {
        InfixOp::Add => Value::string(format!("{a}{b}")),
        InfixOp::Less => Value::boolean(a < b),
        InfixOp::Greater => Value::boolean(a > b),
        InfixOp::LessEqual => Value::boolean(a <= b),
        InfixOp::GreaterEqual => Value::boolean(a >= b),
        InfixOp::Equal => Value::boolean(a == b),
        InfixOp::NotEqual => Value::boolean(a != b),
        InfixOp::And => Value::boolean(!a.is_empty() && !b.is_empty()),
        InfixOp::Or => Value::boolean(!a.is_empty() || !b.is_empty()),
        _ => return Err(unknown(op, &Value::string(a), &Value::string(b))),
    };
    Ok(value)
}

fn booleans(op: InfixOp, a: bool, b: bool) -> OpResult {
    let value = match op {
        InfixOp::Equal => Value::boolean(a == b),
        InfixOp::NotEqual => Value::boolean(a != b),
        InfixOp::And => Value::boolean(a && b),
        InfixOp::Or => Value::boolean(a || b),
        InfixOp::Less => Value::boolean(!a & b),
        InfixOp::Greater => Value::boolean(a & !b),
        InfixOp::LessEqual => Value::boolean(a <= b),
        InfixOp::GreaterEqual => Value::boolean(a >= b),
        _ => return Err(unknown(op, &Value::boolean(a), &Value::boolean(b))),
    };
    Ok(value)
}

/// Boolean/Integer pairs, with the boolean already widened to 0 or 1.
/// `None` for operators the pair does not support.
fn mixed_boolean(op: InfixOp, a: i64, b: i64) -> Option<OpResult> {
    match op {
        InfixOp::Less
        | InfixOp::Greater
        | InfixOp::LessEqual
        | InfixOp::GreaterEqual
        | InfixOp::Equal
        | InfixOp::NotEqual
        | InfixOp::And
        | InfixOp::Or => Some(integers(op, a, b)),
        _ => None,
    }
}

fn concat(left: &Value, right: &Value) -> OpResult {
    match (left.kind(), right.kind()) {
        (ValueKind::String(a), ValueKind::String(b)) => Ok(Value::string(format!("{a}{b}"))),
        (ValueKind::Array(a), ValueKind::Array(b)) => {
            let mut joined = a.borrow().clone();
            joined.extend(b.borrow().iter().cloned());
            Ok(Value::array(joined))
        }
        _ => Err(unknown(InfixOp::Concat, left, right)),
    }
}

fn membership(needle: &Value, haystack: &Value) -> OpResult {
    let found = match haystack.kind() {
        ValueKind::Array(items) => items
            .borrow()
            .iter()
            .any(|item| values_equal(item, needle)),
        ValueKind::Hash(pairs) => {
            let key = needle.hash_key().ok_or_else(|| {
                Diagnostic::runtime(format!("unusable as hash key: {}", needle.type_name()))
            })?;
            pairs.borrow().contains_key(&key)
        }
        ValueKind::String(text) => match needle.kind() {
            ValueKind::String(part) => text.contains(part.as_str()),
            _ => return Err(unknown(InfixOp::In, needle, haystack)),
        },
        _ => return Err(unknown(InfixOp::In, needle, haystack)),
    };
    Ok(Value::boolean(found))
}

fn range(op: InfixOp, left: &Value, right: &Value) -> OpResult {
    let (ValueKind::Integer(start), ValueKind::Integer(end)) = (left.kind(), right.kind()) else {
        return Err(unknown(op, left, right));
    };
    let items: Vec<Value> = if op == InfixOp::RangeInclusive {
        (*start..=*end).map(Value::integer).collect()
    } else {
        (*start..*end).map(Value::integer).collect()
    };
    Ok(Value::array(items))
}
