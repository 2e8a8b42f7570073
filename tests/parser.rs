use lynx::{
    ast::{CasePattern, ExprKind, InfixOp, Program, StmtKind},
    diagnostics::{Diagnostic, DiagnosticKind, LynxError},
    parser::{self, MAX_ERRORS},
};

fn parse(source: &str) -> Program {
    parser::parse_program(source).expect("program should parse")
}

fn parse_errors(source: &str) -> Vec<Diagnostic> {
    match parser::parse_program(source) {
        Ok(program) => panic!("expected parse errors, got {program:?}"),
        Err(LynxError::Diagnostics(diagnostics)) => diagnostics,
        Err(other) => panic!("unexpected error kind: {other}"),
    }
}

fn single_expression(source: &str) -> ExprKind {
    let mut program = parse(source);
    assert_eq!(program.statements.len(), 1, "expected one statement");
    match program.statements.remove(0).kind {
        StmtKind::Expr(expr) => expr.kind,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

fn infix_parts(kind: &ExprKind) -> (InfixOp, &ExprKind, &ExprKind) {
    match kind {
        ExprKind::Infix { op, left, right } => (*op, &left.kind, &right.kind),
        other => panic!("expected infix expression, got {other:?}"),
    }
}

#[test]
fn product_binds_tighter_than_sum() {
    let expr = single_expression("1 + 2 * 3");
    let (op, left, right) = infix_parts(&expr);
    assert_eq!(op, InfixOp::Add);
    assert_eq!(*left, ExprKind::Integer(1));
    assert_eq!(infix_parts(right).0, InfixOp::Mul);
}

#[test]
fn logical_operators_bind_tighter_than_comparison() {
    let expr = single_expression("a < b and c");
    let (op, _, right) = infix_parts(&expr);
    assert_eq!(op, InfixOp::Less);
    assert_eq!(infix_parts(right).0, InfixOp::And);
}

#[test]
fn concat_sits_between_comparison_and_logic() {
    let expr = single_expression("x == \"a\" ++ \"b\"");
    let (op, _, right) = infix_parts(&expr);
    assert_eq!(op, InfixOp::Equal);
    assert_eq!(infix_parts(right).0, InfixOp::Concat);
}

#[test]
fn single_bar_is_or() {
    let expr = single_expression("true | false");
    assert_eq!(infix_parts(&expr).0, InfixOp::Or);
}

#[test]
fn pipe_is_left_associative_and_loosest() {
    let expr = single_expression("1 + 1 |> f |> g(2)");
    let ExprKind::Pipe { left, right } = expr else {
        panic!("expected pipe");
    };
    assert!(matches!(right.kind, ExprKind::Call { .. }));
    let ExprKind::Pipe { left: inner, .. } = left.kind else {
        panic!("expected nested pipe on the left");
    };
    assert_eq!(infix_parts(&inner.kind).0, InfixOp::Add);
}

#[test]
fn parses_calls_methods_indexes_and_properties() {
    let expr = single_expression("a.b(1)[0].c");
    let ExprKind::Property { object, name } = expr else {
        panic!("expected property access");
    };
    assert_eq!(name, "c");
    let ExprKind::Index { target, .. } = object.kind else {
        panic!("expected index");
    };
    assert!(matches!(target.kind, ExprKind::MethodCall { ref method, .. } if method == "b"));
}

#[test]
fn parses_assignment_targets() {
    for source in ["x = 1", "xs[0] = 1", "obj.field = 1"] {
        assert!(matches!(
            single_expression(source),
            ExprKind::Assign { .. }
        ));
    }
    let errors = parse_errors("1 + 2 = 3");
    assert_eq!(errors[0].kind, DiagnosticKind::Syntax);
    assert_eq!(errors[0].message, "Invalid assignment target");
}

#[test]
fn hash_literals_accept_bare_identifier_keys() {
    let expr = parser::parse_expression("{name: 1, \"other\": 2, 3: x}").expect("hash literal");
    let ExprKind::Hash(pairs) = expr.kind else {
        panic!("expected hash literal");
    };
    assert_eq!(pairs[0].0.kind, ExprKind::Str("name".into()));
    assert_eq!(pairs[1].0.kind, ExprKind::Str("other".into()));
    assert_eq!(pairs[2].0.kind, ExprKind::Integer(3));
    assert_eq!(pairs[2].1.kind, ExprKind::Identifier("x".into()));
}

#[test]
fn parses_statement_forms() {
    let program = parse(
        r#"
        let a = 1
        const b = 2;
        for item, index in [1, 2] { continue }
        while false { break }
        class Dog(Animal) { let speak = fn(self) { "woof" } }
        @math
        @strings(upper, lower)
        "#,
    );
    let kinds: Vec<&StmtKind> = program.statements.iter().map(|s| &s.kind).collect();
    assert!(matches!(kinds[0], StmtKind::Var { constant: false, .. }));
    assert!(matches!(kinds[1], StmtKind::Var { constant: true, .. }));
    assert!(matches!(kinds[2], StmtKind::For { index: Some(_), .. }));
    assert!(matches!(kinds[3], StmtKind::While { .. }));
    assert!(matches!(
        kinds[4],
        StmtKind::Class { superclass: Some(parent), .. } if parent == "Animal"
    ));
    assert!(matches!(kinds[5], StmtKind::ModuleLoad { members: None, .. }));
    match kinds[6] {
        StmtKind::ModuleLoad {
            name,
            members: Some(members),
        } => {
            assert_eq!(name, "strings");
            assert_eq!(members, &vec!["upper".to_string(), "lower".to_string()]);
        }
        other => panic!("expected member import, got {other:?}"),
    }
}

#[test]
fn parses_switch_cases() {
    let ExprKind::Switch { cases, .. } = single_expression(
        r#"
        switch x {
            case 1: "one"
            case n if n > 10: { "big" }
            default: "other"
        }
        "#,
    ) else {
        panic!("expected switch");
    };
    assert_eq!(cases.len(), 3);
    assert!(matches!(cases[0].pattern, CasePattern::Value(_)));
    assert!(matches!(&cases[1].pattern, CasePattern::Binding(name) if name == "n"));
    assert!(cases[1].guard.is_some());
    assert!(matches!(cases[2].pattern, CasePattern::Default));
}

#[test]
fn parses_catch_with_and_without_handler() {
    assert!(matches!(
        single_expression("catch { error \"x\" } on err { err }"),
        ExprKind::Catch { handler: Some(_), .. }
    ));
    assert!(matches!(
        single_expression("catch { 1 }"),
        ExprKind::Catch { handler: None, .. }
    ));
}

#[test]
fn else_if_chains_nest_in_the_alternative() {
    let ExprKind::If { alternative, .. } = single_expression("if a { 1 } else if b { 2 } else { 3 }")
    else {
        panic!("expected if");
    };
    let alternative = alternative.expect("else branch");
    assert!(matches!(
        &alternative.statements[0].kind,
        StmtKind::Expr(expr) if matches!(expr.kind, ExprKind::If { alternative: Some(_), .. })
    ));
}

#[test]
fn reports_scope_errors() {
    let errors = parse_errors("break");
    assert_eq!(errors[0].kind, DiagnosticKind::Scope);
    assert_eq!(errors[0].message, "'break' statement outside of loop");

    let errors = parse_errors("return 1");
    assert_eq!(errors[0].message, "'return' statement outside of function");

    let errors = parse_errors("while true { let f = fn() { continue } }");
    assert_eq!(errors[0].message, "'continue' statement outside of loop");

    parse("while true { if x { break } }");
    parse("let f = fn() { return 1 }");
}

#[test]
fn reports_malformed_integer_as_value_error() {
    let errors = parse_errors("99999999999999999999");
    assert_eq!(errors[0].kind, DiagnosticKind::Value);
    assert_eq!(
        errors[0].message,
        "Cannot parse '99999999999999999999' as integer"
    );
}

#[test]
fn reports_missing_tokens_with_positions() {
    let errors = parse_errors("let = 5");
    assert_eq!(errors[0].kind, DiagnosticKind::Syntax);
    assert_eq!(errors[0].message, "Expected 'identifier', got '='");
    let position = errors[0].position.expect("position");
    assert_eq!((position.line, position.column), (1, 5));
}

#[test]
fn recovers_and_reports_several_errors() {
    let errors = parse_errors("let = 1;\nlet ok = 2;\nlet = 3;");
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[1].position.map(|p| p.line), Some(3));
}

#[test]
fn recovers_at_line_breaks_between_expression_statements() {
    let errors = parse_errors("a = )\nb = )\nc = )\n");
    let lines: Vec<_> = errors
        .iter()
        .map(|diag| diag.position.map(|p| p.line))
        .collect();
    assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn stops_after_error_ceiling() {
    let source = "let = 1;\n".repeat(MAX_ERRORS + 5);
    let errors = parse_errors(&source);
    assert_eq!(errors.len(), MAX_ERRORS + 2);
    assert_eq!(
        errors.last().map(|d| d.message.as_str()),
        Some("Too many parse errors, stopping")
    );
}

#[test]
fn lexical_errors_are_reported_first() {
    let errors = parse_errors("let x = # ;");
    assert_eq!(errors[0].kind, DiagnosticKind::Lexical);
}

#[test]
fn parses_a_lone_expression() {
    let expr = parser::parse_expression("[1, {\"a\": 2.5}]").expect("expression");
    assert!(matches!(expr.kind, ExprKind::Array(ref items) if items.len() == 2));
    assert!(parser::parse_expression("1 2").is_err());
}
