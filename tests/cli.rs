use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs, path::PathBuf};
use tempfile::{tempdir, TempDir};

fn script(source: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("main.lynx");
    fs::write(&path, source).expect("write script");
    (dir, path)
}

fn lynx() -> Command {
    Command::cargo_bin("lynx").expect("binary exists")
}

#[test]
fn runs_a_script_and_prints() {
    let (_dir, path) = script("let greet = fn(name) { \"Hello, \" ++ name }\nprintln(greet(\"Lynx\"))");
    lynx()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, Lynx"));
}

#[test]
fn main_return_value_becomes_exit_code() {
    let (_dir, path) = script("let main = fn() { 3 }");
    lynx().arg(&path).assert().code(3);
}

#[test]
fn out_of_range_exit_codes_still_fail() {
    let (_dir, path) = script("let main = fn() { 256 }");
    lynx().arg(&path).assert().code(255);

    let (_dir, path) = script("let main = fn() { -3 }");
    lynx().arg(&path).assert().code(1);
}

#[test]
fn main_receives_script_arguments() {
    let (_dir, path) = script("let main = fn(args) {\n  println(args.join(\"+\"))\n  len(args)\n}");
    lynx()
        .arg(&path)
        .args(["alpha", "--beta"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("alpha+--beta"));
}

#[test]
fn scripts_load_modules_next_to_them() {
    let (dir, path) = script("@helpers\nprintln(helpers.twice(21))");
    fs::write(
        dir.path().join("helpers.lynx"),
        "let twice = fn(x) { x * 2 }",
    )
    .expect("write module");
    lynx()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn runtime_errors_exit_with_failure() {
    let (_dir, path) = script("println(\"before\")\n1 / 0\nprintln(\"after\")");
    lynx()
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("before"))
        .stdout(predicate::str::contains("after").not())
        .stderr(predicate::str::contains("Error: division by zero"));
}

#[test]
fn uncaught_error_values_exit_with_failure() {
    let (_dir, path) = script("let main = fn() { error \"bad input\" }");
    lynx()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad input"));
}

#[test]
fn parse_errors_are_reported_with_positions() {
    let (_dir, path) = script("let = 1");
    lynx()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1, column 5"));
}

#[test]
fn missing_script_is_an_error() {
    let dir = tempdir().expect("create temp dir");
    lynx()
        .arg(dir.path().join("absent.lynx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}
