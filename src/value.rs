use std::{
    cell::RefCell,
    fmt::{self, Write as _},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{ast::FunctionLiteral, diagnostics::Diagnostic, environment::EnvironmentRef};

thread_local! {
    static NULL: Value = Value::new(ValueKind::Null);
    static TRUE: Value = Value::new(ValueKind::Boolean(true));
    static FALSE: Value = Value::new(ValueKind::Boolean(false));
}

/// A runtime value. Cloning shares the underlying allocation, so arrays,
/// hashes and instances have reference semantics.
#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

pub enum ValueKind {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Array(RefCell<Vec<Value>>),
    Hash(RefCell<IndexMap<HashKey, HashPair>>),
    Function(Function),
    Builtin(Builtin),
    Class(Rc<Class>),
    Instance(Instance),
    Module(Module),
    Error(String),
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        NULL.with(Value::clone)
    }

    pub fn boolean(value: bool) -> Self {
        if value {
            TRUE.with(Value::clone)
        } else {
            FALSE.with(Value::clone)
        }
    }

    pub fn integer(value: i64) -> Self {
        Self::new(ValueKind::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn hash(pairs: IndexMap<HashKey, HashPair>) -> Self {
        Self::new(ValueKind::Hash(RefCell::new(pairs)))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ValueKind::Error(message.into()))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind(), ValueKind::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind(), ValueKind::Error(_))
    }

    /// Only `null` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self.kind(), ValueKind::Null | ValueKind::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            ValueKind::Integer(_) => "INTEGER",
            ValueKind::Float(_) => "FLOAT",
            ValueKind::String(_) => "STRING",
            ValueKind::Boolean(_) => "BOOLEAN",
            ValueKind::Null => "NULL",
            ValueKind::Array(_) => "ARRAY",
            ValueKind::Hash(_) => "HASH",
            ValueKind::Function(_) => "FUNCTION",
            ValueKind::Builtin(_) => "BUILTIN",
            ValueKind::Class(_) => "CLASS",
            ValueKind::Instance(_) => "INSTANCE",
            ValueKind::Module(_) => "MODULE",
            ValueKind::Error(_) => "ERROR",
        }
    }

    /// Copies the outer container of arrays and hashes so the copy can be
    /// mutated independently; every other kind is shared.
    pub fn shallow_copy(&self) -> Value {
        match self.kind() {
            ValueKind::Array(items) => Value::array(items.borrow().clone()),
            ValueKind::Hash(pairs) => Value::hash(pairs.borrow().clone()),
            _ => self.clone(),
        }
    }

    pub fn is_same(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Structural equality used by `switch`: scalars by value, arrays and
    /// hashes recursively, everything else by identity. Kinds never mix.
    pub fn deep_eq(&self, other: &Value) -> bool {
        self.deep_eq_within(other, &mut Vec::new())
    }

    /// `comparing` holds the container pairs already being compared further
    /// up; meeting one again means a cycle, which compares equal.
    fn deep_eq_within(
        &self,
        other: &Value,
        comparing: &mut Vec<(*const ValueKind, *const ValueKind)>,
    ) -> bool {
        let pair = (Rc::as_ptr(&self.0), Rc::as_ptr(&other.0));
        match (self.kind(), other.kind()) {
            (ValueKind::Integer(a), ValueKind::Integer(b)) => a == b,
            (ValueKind::Float(a), ValueKind::Float(b)) => a == b,
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a == b,
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Error(a), ValueKind::Error(b)) => a == b,
            (ValueKind::Array(_), ValueKind::Array(_)) | (ValueKind::Hash(_), ValueKind::Hash(_))
                if comparing.contains(&pair) =>
            {
                true
            }
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                comparing.push(pair);
                let equal = a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(l, r)| l.deep_eq_within(r, comparing));
                comparing.pop();
                equal
            }
            (ValueKind::Hash(a), ValueKind::Hash(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                comparing.push(pair);
                let equal = a.len() == b.len()
                    && a.iter().all(|(key, entry)| {
                        b.get(key)
                            .map(|other| entry.value.deep_eq_within(&other.value, comparing))
                            .unwrap_or(false)
                    });
                comparing.pop();
                equal
            }
            _ => self.is_same(other),
        }
    }

    /// Key under which this value is stored in a hash, if it is hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        let (tag, value) = match self.kind() {
            ValueKind::Integer(n) => (HashKeyTag::Integer, *n as u64),
            ValueKind::Boolean(b) => (HashKeyTag::Boolean, u64::from(*b)),
            ValueKind::String(s) => (HashKeyTag::String, fnv1a(s.as_bytes())),
            ValueKind::Function(_) | ValueKind::Builtin(_) => {
                (HashKeyTag::Function, Rc::as_ptr(&self.0) as usize as u64)
            }
            _ => return None,
        };
        Some(HashKey { tag, value })
    }
}

const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// 64-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKeyTag {
    Integer,
    String,
    Boolean,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub tag: HashKeyTag,
    pub value: u64,
}

/// A hash entry keeps the original key so it can be displayed and iterated.
#[derive(Clone)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

#[derive(Clone)]
pub struct Function {
    pub literal: Rc<FunctionLiteral>,
    pub env: EnvironmentRef,
}

impl Function {
    pub fn params(&self) -> &[String] {
        &self.literal.params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Between(usize, usize),
    Any,
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::Between(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::Between(min, max) => write!(f, "{min}..{max}"),
            Arity::Any => f.write_str("any"),
        }
    }
}

pub type BuiltinFn = fn(&[Value]) -> Result<Value, Diagnostic>;

#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub callback: BuiltinFn,
}

impl Builtin {
    pub fn call(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        if !self.arity.accepts(args.len()) {
            return Err(Diagnostic::runtime(format!(
                "wrong number of arguments. got={}, want={}",
                args.len(),
                self.arity
            )));
        }
        (self.callback)(args)
    }
}

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    /// Inherited methods first, overridden in place by the class's own.
    pub methods: IndexMap<String, Function>,
    /// Per-instance attribute defaults, inherited the same way as methods.
    pub fields: IndexMap<String, Value>,
    pub env: EnvironmentRef,
}

pub struct Instance {
    pub class: Rc<Class>,
    pub attributes: RefCell<IndexMap<String, Value>>,
}

pub struct Module {
    pub name: String,
    pub env: EnvironmentRef,
    /// Names bound at the module's top level once evaluation finished.
    pub members: Vec<String>,
}

/// Float text that always reads back as a float.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in text.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            other => f.write_char(other)?,
        }
    }
    f.write_char('"')
}

/// Writes `value`, quoting strings when `nested`. `path` holds the
/// containers currently being written; one that shows up again inside
/// itself prints as `[...]` or `{...}`.
fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    nested: bool,
    path: &mut Vec<*const ValueKind>,
) -> fmt::Result {
    let id = Rc::as_ptr(&value.0);
    match value.kind() {
        ValueKind::String(s) if nested => write_quoted(f, s),
        ValueKind::Array(_) if path.contains(&id) => f.write_str("[...]"),
        ValueKind::Hash(_) if path.contains(&id) => f.write_str("{...}"),
        ValueKind::Array(values) => {
            path.push(id);
            f.write_char('[')?;
            for (idx, item) in values.borrow().iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item, true, path)?;
            }
            path.pop();
            f.write_char(']')
        }
        ValueKind::Hash(pairs) => {
            path.push(id);
            f.write_char('{')?;
            for (idx, pair) in pairs.borrow().values().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, &pair.key, true, path)?;
                f.write_str(": ")?;
                write_value(f, &pair.value, true, path)?;
            }
            path.pop();
            f.write_char('}')
        }
        _ => write_scalar(f, value),
    }
}

fn write_scalar(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value.kind() {
        ValueKind::Integer(n) => write!(f, "{n}"),
        ValueKind::Float(n) => f.write_str(&format_float(*n)),
        ValueKind::String(s) => f.write_str(s),
        ValueKind::Boolean(b) => write!(f, "{b}"),
        ValueKind::Null => f.write_str("null"),
        ValueKind::Array(_) | ValueKind::Hash(_) => write_value(f, value, false, &mut Vec::new()),
        ValueKind::Function(fun) => write!(f, "fn({})", fun.params().join(", ")),
        ValueKind::Builtin(builtin) => write!(f, "builtin function {}", builtin.name),
        ValueKind::Class(class) => write!(f, "<class {}>", class.name),
        ValueKind::Instance(instance) => write!(f, "<instance of {}>", instance.class.name),
        ValueKind::Module(module) => write!(f, "<module {}>", module.name),
        ValueKind::Error(message) => write!(f, "ERROR: {message}"),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, true, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, false, &mut Vec::new())
    }
}
