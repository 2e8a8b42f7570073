use lynx::{
    diagnostics::{DiagnosticKind, Position},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

fn tokens(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

fn kinds(source: &str) -> Vec<TokenKind> {
    tokens(source).into_iter().map(|token| token.kind).collect()
}

fn error_messages(source: &str) -> Vec<String> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize();
    lexer
        .into_errors()
        .into_iter()
        .map(|diag| {
            assert_eq!(diag.kind, DiagnosticKind::Lexical);
            diag.message
        })
        .collect()
}

#[test]
fn scans_multi_character_operators_by_longest_match() {
    assert_eq!(
        kinds("== != <= >= ++ |> ... .. ..= :: -> | ."),
        vec![
            TokenKind::EqualEqual,
            TokenKind::BangEqual,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::Concat,
            TokenKind::PipeArrow,
            TokenKind::Ellipsis,
            TokenKind::DotDot,
            TokenKind::DotDotEqual,
            TokenKind::DoubleColon,
            TokenKind::Arrow,
            TokenKind::Pipe,
            TokenKind::Dot,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn distinguishes_keywords_from_identifiers() {
    assert_eq!(
        kinds("let letter = self"),
        vec![
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Keyword(Keyword::SelfValue),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn scans_number_forms() {
    let scanned = tokens("42 1.5 .5 1. 1..5");
    let summary: Vec<(TokenKind, &str)> = scanned
        .iter()
        .map(|token| (token.kind.clone(), token.lexeme.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (TokenKind::Integer, "42"),
            (TokenKind::Float, "1.5"),
            (TokenKind::Float, ".5"),
            (TokenKind::Float, "1."),
            (TokenKind::Integer, "1"),
            (TokenKind::DotDot, ".."),
            (TokenKind::Integer, "5"),
            (TokenKind::Eof, ""),
        ]
    );
}

#[test]
fn unescapes_string_literals() {
    let scanned = tokens(r#""a\tb\n" 'it\'s' "keep \q""#);
    assert_eq!(scanned[0].lexeme, "a\tb\n");
    assert_eq!(scanned[1].lexeme, "it's");
    assert_eq!(scanned[2].lexeme, "keep \\q");
    assert!(scanned[..3]
        .iter()
        .all(|token| token.kind == TokenKind::String));
}

#[test]
fn tracks_line_and_column() {
    let scanned = tokens("let a = 1\n  a");
    assert_eq!(scanned[0].position, Position::new(1, 1));
    assert_eq!(scanned[3].position, Position::new(1, 9));
    assert_eq!(scanned[4].position, Position::new(2, 3));
}

#[test]
fn skips_nested_block_and_line_comments() {
    assert_eq!(
        kinds("1 /* outer /* inner */ still */ 2 // trailing\n3"),
        vec![
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn records_unterminated_literals_and_comments() {
    assert_eq!(error_messages("\"open"), vec!["Unterminated string literal"]);
    assert_eq!(error_messages("'c"), vec!["Unterminated character literal"]);
    assert_eq!(
        error_messages("/* never closed"),
        vec!["Unterminated block comment"]
    );
}

#[test]
fn continues_after_illegal_characters() {
    let mut lexer = Lexer::new("1 # 2");
    let kinds: Vec<TokenKind> = lexer.tokenize().into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Integer,
            TokenKind::Illegal,
            TokenKind::Integer,
            TokenKind::Eof,
        ]
    );
    assert_eq!(lexer.errors().len(), 1);
    assert_eq!(lexer.errors()[0].message, "Unexpected character '#' (U+0023)");
    assert_eq!(lexer.errors()[0].position, Some(Position::new(1, 3)));
}

#[test]
fn replaces_invalid_utf8_and_reports_it() {
    let mut lexer = Lexer::from_bytes(b"a \xff b");
    let scanned = lexer.tokenize();
    assert_eq!(scanned.len(), 4);
    assert_eq!(scanned[1].kind, TokenKind::Illegal);
    assert_eq!(scanned[1].lexeme, "\u{FFFD}");
    let messages: Vec<&str> = lexer.errors().iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["Invalid UTF-8 encoding"]);
}

#[test]
fn keeps_returning_eof_when_exhausted() {
    let mut lexer = Lexer::new("x");
    assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
}
