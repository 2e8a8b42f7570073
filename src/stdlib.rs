use std::{
    io::{self, BufRead, Read, Write},
    thread,
    time::Duration,
};

use crate::{
    diagnostics::Diagnostic,
    environment::EnvironmentRef,
    value::{Arity, Builtin, BuiltinFn, Value, ValueKind},
};

type BuiltinResult = Result<Value, Diagnostic>;

/// Binds every builtin in `env`. Scripts may shadow any of them.
pub fn install(env: &EnvironmentRef) {
    let builtins: [(&'static str, Arity, BuiltinFn); 15] = [
        ("println", Arity::Any, io_println),
        ("print", Arity::Any, io_print),
        ("len", Arity::Exact(1), len),
        ("range", Arity::Between(2, 3), range),
        ("type", Arity::Exact(1), type_of),
        ("str", Arity::Exact(1), to_str),
        ("int", Arity::Exact(1), to_int),
        ("float", Arity::Exact(1), to_float),
        ("_read", Arity::Exact(0), io_read_word),
        ("_readLine", Arity::Exact(0), io_read_line),
        ("_write", Arity::Exact(1), io_write),
        ("_sleep", Arity::Exact(1), sleep),
        ("_random", Arity::Exact(0), random),
        ("_http_get", Arity::Exact(1), http_get),
        ("_http_post", Arity::Exact(3), http_post),
    ];

    let mut scope = env.borrow_mut();
    for (name, arity, callback) in builtins {
        scope.define(name, builtin(name, arity, callback), false);
    }
}

fn builtin(name: &'static str, arity: Arity, callback: BuiltinFn) -> Value {
    Value::new(ValueKind::Builtin(Builtin {
        name,
        arity,
        callback,
    }))
}

fn type_error(name: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::runtime(format!(
        "argument to `{name}` must be {expected}, got {}",
        value.type_name()
    ))
}

fn expect_string<'a>(value: &'a Value, name: &str) -> Result<&'a str, Diagnostic> {
    match value.kind() {
        ValueKind::String(s) => Ok(s),
        _ => Err(type_error(name, "STRING", value)),
    }
}

fn expect_int(value: &Value, name: &str) -> Result<i64, Diagnostic> {
    match value.kind() {
        ValueKind::Integer(n) => Ok(*n),
        _ => Err(type_error(name, "INTEGER", value)),
    }
}

fn io_error(name: &str, err: io::Error) -> Diagnostic {
    let mut diagnostic = Diagnostic::runtime(format!("`{name}` failed: {err}"));
    if let Some(code) = err.raw_os_error() {
        diagnostic = diagnostic.with_note(format!("os error code: {code}"));
    }
    diagnostic
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn io_print(args: &[Value]) -> BuiltinResult {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", joined(args)).map_err(|err| io_error("print", err))?;
    stdout.flush().map_err(|err| io_error("print", err))?;
    Ok(Value::null())
}

fn io_println(args: &[Value]) -> BuiltinResult {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", joined(args)).map_err(|err| io_error("println", err))?;
    Ok(Value::null())
}

fn io_write(args: &[Value]) -> BuiltinResult {
    let text = expect_string(&args[0], "_write")?;
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| io_error("_write", err))?;
    Ok(Value::null())
}

fn io_read_word(_: &[Value]) -> BuiltinResult {
    let mut word = Vec::new();
    for byte in io::stdin().lock().bytes() {
        let byte = byte.map_err(|err| io_error("_read", err))?;
        if byte.is_ascii_whitespace() {
            if word.is_empty() {
                continue;
            }
            break;
        }
        word.push(byte);
    }
    tracing::debug!(bytes = word.len(), "read word from stdin");
    Ok(Value::string(String::from_utf8_lossy(&word)))
}

fn io_read_line(_: &[Value]) -> BuiltinResult {
    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|err| io_error("_readLine", err))?;
    if input.ends_with('\n') {
        input.pop();
        if input.ends_with('\r') {
            input.pop();
        }
    }
    tracing::debug!(bytes = input.len(), "read line from stdin");
    Ok(Value::string(input))
}

fn len(args: &[Value]) -> BuiltinResult {
    let count = match args[0].kind() {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(items) => items.borrow().len(),
        ValueKind::Hash(pairs) => pairs.borrow().len(),
        _ => return Err(type_error("len", "STRING, ARRAY or HASH", &args[0])),
    };
    Ok(Value::integer(count as i64))
}

fn range(args: &[Value]) -> BuiltinResult {
    let start = expect_int(&args[0], "range")?;
    let end = expect_int(&args[1], "range")?;
    let step = match args.get(2) {
        Some(step) => {
            let raw = expect_int(step, "range")?;
            if raw == 0 {
                return Err(Diagnostic::runtime("range step must be non-zero"));
            }
            raw
        }
        None if start <= end => 1,
        None => -1,
    };

    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        values.push(Value::integer(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::array(values))
}

fn type_of(args: &[Value]) -> BuiltinResult {
    Ok(Value::string(args[0].type_name()))
}

fn to_str(args: &[Value]) -> BuiltinResult {
    Ok(Value::string(args[0].to_string()))
}

fn to_int(args: &[Value]) -> BuiltinResult {
    let value = match args[0].kind() {
        ValueKind::Integer(n) => *n,
        ValueKind::Float(f) => f.trunc() as i64,
        ValueKind::Boolean(b) => i64::from(*b),
        ValueKind::String(s) => s.trim().parse().map_err(|_| {
            Diagnostic::runtime(format!("`int` could not parse {s:?} as INTEGER"))
        })?,
        _ => return Err(type_error("int", "INTEGER, FLOAT, BOOLEAN or STRING", &args[0])),
    };
    Ok(Value::integer(value))
}

fn to_float(args: &[Value]) -> BuiltinResult {
    let value = match args[0].kind() {
        ValueKind::Float(f) => *f,
        ValueKind::Integer(n) => *n as f64,
        ValueKind::String(s) => s.trim().parse().map_err(|_| {
            Diagnostic::runtime(format!("`float` could not parse {s:?} as FLOAT"))
        })?,
        _ => return Err(type_error("float", "FLOAT, INTEGER or STRING", &args[0])),
    };
    Ok(Value::float(value))
}

fn sleep(args: &[Value]) -> BuiltinResult {
    let millis = expect_int(&args[0], "_sleep")?;
    let millis = u64::try_from(millis)
        .map_err(|_| Diagnostic::runtime("sleep duration must be non-negative"))?;
    tracing::debug!(millis, "sleeping");
    thread::sleep(Duration::from_millis(millis));
    Ok(Value::null())
}

fn random(_: &[Value]) -> BuiltinResult {
    Ok(Value::float(rand::random::<f64>()))
}

fn http_get(args: &[Value]) -> BuiltinResult {
    let url = expect_string(&args[0], "_http_get")?;
    tracing::debug!(url, "http GET");
    response_body("_http_get", ureq::get(url).call())
}

fn http_post(args: &[Value]) -> BuiltinResult {
    let url = expect_string(&args[0], "_http_post")?;
    let content_type = expect_string(&args[1], "_http_post")?;
    let body = expect_string(&args[2], "_http_post")?;
    tracing::debug!(url, content_type, bytes = body.len(), "http POST");
    response_body(
        "_http_post",
        ureq::post(url)
            .set("Content-Type", content_type)
            .send_string(body),
    )
}

/// Error statuses still carry a body, which is returned like any other.
fn response_body(name: &str, outcome: Result<ureq::Response, ureq::Error>) -> BuiltinResult {
    let response = match outcome {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            tracing::debug!(status, "http error status");
            response
        }
        Err(err) => {
            return Err(Diagnostic::runtime(format!("`{name}` request failed: {err}")));
        }
    };
    let body = response.into_string().map_err(|err| io_error(name, err))?;
    Ok(Value::string(body))
}
