use std::{fs, path::Path};

use lynx::{
    diagnostics::LynxError,
    modules::{ModuleCache, ModuleSearch},
    runtime::{ExecutionContext, Interpreter},
    value::{Value, ValueKind},
};
use tempfile::tempdir;

fn write_module(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{name}.lynx")), source).expect("write module file");
}

fn interpreter_in(dir: &Path, search: ModuleSearch) -> Interpreter {
    ModuleCache::clear();
    Interpreter::with_context(ExecutionContext {
        script_dir: dir.to_path_buf(),
        search,
        ..ExecutionContext::default()
    })
}

fn run(dir: &Path, source: &str) -> Result<Value, LynxError> {
    interpreter_in(dir, ModuleSearch::script_dir_only()).eval_source(source)
}

fn runtime_message(result: Result<Value, LynxError>) -> String {
    match result {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(LynxError::Runtime(diag)) => diag.message,
        Err(other) => panic!("expected runtime error, found {other}"),
    }
}

#[test]
fn loads_module_and_reads_members() {
    let dir = tempdir().expect("create temp dir");
    write_module(
        dir.path(),
        "geometry",
        "let square = fn(x) { x * x }\nconst unit = 1",
    );
    let value = run(
        dir.path(),
        "@geometry\ngeometry.square(4) + geometry.unit",
    )
    .expect("module call");
    assert_eq!(value.to_string(), "17");
}

#[test]
fn bare_load_binds_a_constant_module_value() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "shapes", "let sides = 4");
    let value = run(dir.path(), "@shapes\n[type(shapes), str(shapes)]").expect("module value");
    assert_eq!(value.to_string(), r#"["MODULE", "<module shapes>"]"#);

    let module = ModuleCache::get("shapes").expect("cached module");
    match module.kind() {
        ValueKind::Module(loaded) => assert_eq!(loaded.members, vec!["sides".to_string()]),
        _ => panic!("expected Module, found {}", module.type_name()),
    }

    let message = runtime_message(run(dir.path(), "@shapes\nshapes = 1"));
    assert_eq!(message, "cannot assign to constant: shapes");
}

#[test]
fn second_load_reuses_the_cached_module() {
    let dir = tempdir().expect("create temp dir");
    write_module(
        dir.path(),
        "tally",
        r#"
        let state = {"count": 0}
        let bump = fn() {
            state["count"] = state["count"] + 1
            state["count"]
        }
        "#,
    );
    let value = run(
        dir.path(),
        "@tally\nlet first = tally.bump()\n@tally(bump)\nlet second = bump();\n[first, second]",
    )
    .expect("cached module");
    assert_eq!(value.to_string(), "[1, 2]");
    assert!(ModuleCache::contains("tally"));
}

#[test]
fn member_list_binds_each_member() {
    let dir = tempdir().expect("create temp dir");
    write_module(
        dir.path(),
        "words",
        "let shout = fn(s) { s.upper() ++ \"!\" }\nlet whisper = fn(s) { s.lower() }",
    );
    let value = run(
        dir.path(),
        "@words(shout, whisper)\nshout(\"hi\") ++ whisper(\"HO\")",
    )
    .expect("member import");
    match value.kind() {
        ValueKind::String(s) => assert_eq!(s, "HI!ho"),
        _ => panic!("expected String, found {}", value.type_name()),
    }
}

#[test]
fn missing_member_is_an_error() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "sparse", "let here = 1");
    let message = runtime_message(run(dir.path(), "@sparse(here, gone)"));
    assert_eq!(message, "undefined member gone in module sparse");
}

#[test]
fn missing_module_lists_searched_paths() {
    let dir = tempdir().expect("create temp dir");
    let message = runtime_message(run(dir.path(), "@ghost"));
    assert!(message.starts_with("could not find module \"ghost\""));
    assert!(message.contains("ghost.lynx"), "unexpected message: {message}");
}

#[test]
fn module_found_in_two_roots_is_ambiguous() {
    let script = tempdir().expect("create temp dir");
    let local = tempdir().expect("create temp dir");
    write_module(script.path(), "twice", "let a = 1");
    write_module(local.path(), "twice", "let a = 2");
    let search = ModuleSearch {
        local_root: Some(local.path().to_path_buf()),
        ..ModuleSearch::script_dir_only()
    };
    let message = runtime_message(interpreter_in(script.path(), search).eval_source("@twice"));
    assert!(
        message.starts_with("module \"twice\" conflicts: found in multiple paths"),
        "unexpected message: {message}"
    );
}

#[test]
fn repeated_root_is_searched_once() {
    let dir = tempdir().expect("create temp dir");
    let search = ModuleSearch {
        local_root: Some(dir.path().to_path_buf()),
        ..ModuleSearch::script_dir_only()
    };
    assert_eq!(search.candidates("solo", dir.path()).len(), 1);
}

#[test]
fn circular_loads_are_reported() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "ping", "@pong\nlet p = 1");
    write_module(dir.path(), "pong", "@ping\nlet q = 2");
    let message = runtime_message(run(dir.path(), "@ping"));
    assert_eq!(message, "circular module load: ping -> pong -> ping");
    assert!(!ModuleCache::contains("ping"));
}

#[test]
fn parse_errors_in_a_module_carry_notes() {
    let dir = tempdir().expect("create temp dir");
    write_module(dir.path(), "broken", "let = 1");
    match run(dir.path(), "@broken") {
        Err(LynxError::Runtime(diag)) => {
            assert!(diag.message.starts_with("parse errors in"));
            assert!(diag.message.contains("broken.lynx"));
            assert_eq!(diag.notes.len(), 1);
        }
        other => panic!("expected runtime error, found {other:?}"),
    }
}

#[test]
fn nested_module_loads_resolve_from_the_module_directory() {
    let root = tempdir().expect("create temp dir");
    let lib = root.path().join("lib");
    fs::create_dir(&lib).expect("create lib dir");
    write_module(&lib, "outer", "@inner\nlet value = inner.base + 1");
    write_module(&lib, "inner", "let base = 41");
    let search = ModuleSearch {
        std_root: Some(lib.clone()),
        ..ModuleSearch::script_dir_only()
    };
    let value = interpreter_in(root.path(), search)
        .eval_source("@outer\nouter.value")
        .expect("nested load");
    assert_eq!(value.to_string(), "42");
}
