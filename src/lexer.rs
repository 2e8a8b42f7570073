use std::collections::BTreeSet;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Fn,
    Let,
    Const,
    True,
    False,
    Null,
    If,
    Else,
    Return,
    For,
    While,
    In,
    Continue,
    Break,
    And,
    Or,
    Switch,
    Case,
    Default,
    On,
    Catch,
    Error,
    Class,
    SelfValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    At,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Dollar,
    Bang,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Concat,
    PipeArrow,
    Pipe,
    DotDot,
    DotDotEqual,
    Ellipsis,
    DoubleColon,
    Arrow,
    Illegal,
    Eof,
}

impl TokenKind {
    /// Human readable spelling used in parser messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Keyword(keyword) => keyword.as_str(),
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::At => "@",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Dollar => "$",
            TokenKind::Bang => "!",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Concat => "++",
            TokenKind::PipeArrow => "|>",
            TokenKind::Pipe => "|",
            TokenKind::DotDot => "..",
            TokenKind::DotDotEqual => "..=",
            TokenKind::Ellipsis => "...",
            TokenKind::DoubleColon => "::",
            TokenKind::Arrow => "->",
            TokenKind::Illegal => "illegal token",
            TokenKind::Eof => "end of input",
        }
    }
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Fn => "fn",
            Keyword::Let => "let",
            Keyword::Const => "const",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::Return => "return",
            Keyword::For => "for",
            Keyword::While => "while",
            Keyword::In => "in",
            Keyword::Continue => "continue",
            Keyword::Break => "break",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Default => "default",
            Keyword::On => "on",
            Keyword::Catch => "catch",
            Keyword::Error => "error",
            Keyword::Class => "class",
            Keyword::SelfValue => "self",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; for string literals the unescaped contents.
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }
}

/// On-demand scanner over Unicode code points.
///
/// Anomalies never stop scanning: they are recorded in [`Lexer::errors`] and
/// surface as [`TokenKind::Illegal`] tokens so the stream stays usable.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    invalid: BTreeSet<usize>,
    errors: Vec<Diagnostic>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            invalid: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    /// Scans raw bytes, replacing every invalid UTF-8 sequence with U+FFFD and
    /// reporting it once the scanner reaches it.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut chars = Vec::with_capacity(bytes.len());
        let mut invalid = BTreeSet::new();
        for chunk in bytes.utf8_chunks() {
            chars.extend(chunk.valid().chars());
            if !chunk.invalid().is_empty() {
                invalid.insert(chars.len());
                chars.push(char::REPLACEMENT_CHARACTER);
            }
        }
        let mut lexer = Self::new("");
        lexer.chars = chars;
        lexer.invalid = invalid;
        lexer
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Diagnostic> {
        self.errors
    }

    /// Scans every remaining token, ending with exactly one `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tracing::debug!(tokens = tokens.len(), errors = self.errors.len(), "scanned source");
        tokens
    }

    /// Produces the next token. Once the input is exhausted every call
    /// returns an `Eof` token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let start = self.here();
        let index = self.pos;
        let Some(ch) = self.bump() else {
            return Token::new(TokenKind::Eof, "", start);
        };

        match ch {
            c if c.is_alphabetic() || c == '_' => self.identifier_or_keyword(c, start),
            '0'..='9' => self.number_literal(ch, start),
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.number_literal(ch, start)
            }
            '"' => self.string_literal('"', start),
            '\'' => self.string_literal('\'', start),
            '(' => Token::new(TokenKind::LParen, "(", start),
            ')' => Token::new(TokenKind::RParen, ")", start),
            '{' => Token::new(TokenKind::LBrace, "{", start),
            '}' => Token::new(TokenKind::RBrace, "}", start),
            '[' => Token::new(TokenKind::LBracket, "[", start),
            ']' => Token::new(TokenKind::RBracket, "]", start),
            ',' => Token::new(TokenKind::Comma, ",", start),
            ';' => Token::new(TokenKind::Semicolon, ";", start),
            '@' => Token::new(TokenKind::At, "@", start),
            '*' => Token::new(TokenKind::Star, "*", start),
            '/' => Token::new(TokenKind::Slash, "/", start),
            '%' => Token::new(TokenKind::Percent, "%", start),
            '^' => Token::new(TokenKind::Caret, "^", start),
            '$' => Token::new(TokenKind::Dollar, "$", start),
            '.' => {
                if self.match_next('.') {
                    if self.match_next('.') {
                        Token::new(TokenKind::Ellipsis, "...", start)
                    } else if self.match_next('=') {
                        Token::new(TokenKind::DotDotEqual, "..=", start)
                    } else {
                        Token::new(TokenKind::DotDot, "..", start)
                    }
                } else {
                    Token::new(TokenKind::Dot, ".", start)
                }
            }
            ':' => self.either(':', TokenKind::DoubleColon, "::", TokenKind::Colon, ":", start),
            '+' => self.either('+', TokenKind::Concat, "++", TokenKind::Plus, "+", start),
            '-' => self.either('>', TokenKind::Arrow, "->", TokenKind::Minus, "-", start),
            '|' => self.either('>', TokenKind::PipeArrow, "|>", TokenKind::Pipe, "|", start),
            '=' => self.either('=', TokenKind::EqualEqual, "==", TokenKind::Assign, "=", start),
            '!' => self.either('=', TokenKind::BangEqual, "!=", TokenKind::Bang, "!", start),
            '<' => self.either('=', TokenKind::LessEqual, "<=", TokenKind::Less, "<", start),
            '>' => self.either('=', TokenKind::GreaterEqual, ">=", TokenKind::Greater, ">", start),
            other => {
                if !self.invalid.contains(&index) {
                    self.error(
                        format!("Unexpected character '{other}' (U+{:04X})", other as u32),
                        start,
                    );
                }
                Token::new(TokenKind::Illegal, other.to_string(), start)
            }
        }
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        if self.invalid.contains(&self.pos) {
            let position = self.here();
            self.error("Invalid UTF-8 encoding", position);
        }
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn either(
        &mut self,
        second: char,
        long: TokenKind,
        long_text: &str,
        short: TokenKind,
        short_text: &str,
        start: Position,
    ) -> Token {
        if self.match_next(second) {
            Token::new(long, long_text, start)
        } else {
            Token::new(short, short_text, start)
        }
    }

    fn error(&mut self, message: impl Into<String>, position: Position) {
        self.errors
            .push(Diagnostic::new(DiagnosticKind::Lexical, message).with_position(position));
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            match (self.peek(), self.peek_second()) {
                (Some('/'), Some('/')) => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.here();
                    self.bump();
                    self.bump();
                    let mut depth = 1;
                    while depth > 0 {
                        match self.bump() {
                            Some('/') if self.match_next('*') => depth += 1,
                            Some('*') if self.match_next('/') => depth -= 1,
                            Some(_) => {}
                            None => {
                                self.error("Unterminated block comment", start);
                                return;
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn identifier_or_keyword(&mut self, first: char, start: Position) -> Token {
        let mut lexeme = String::from(first);
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                lexeme.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, start)
    }

    fn number_literal(&mut self, first: char, start: Position) -> Token {
        let mut lexeme = String::from(first);
        let mut is_float = first == '.';
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => {
                    lexeme.push(ch);
                    self.bump();
                }
                // `1..5` is a range, not a float followed by a dot.
                '.' if !is_float && self.peek_second() != Some('.') => {
                    is_float = true;
                    lexeme.push(ch);
                    self.bump();
                }
                _ => break,
            }
        }
        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Token::new(kind, lexeme, start)
    }

    fn string_literal(&mut self, quote: char, start: Position) -> Token {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(ch) if ch == quote => return Token::new(TokenKind::String, value, start),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => break,
                },
                Some(ch) => value.push(ch),
                None => break,
            }
        }
        let message = if quote == '"' {
            "Unterminated string literal"
        } else {
            "Unterminated character literal"
        };
        self.error(message, start);
        Token::new(TokenKind::Illegal, value, start)
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "fn" => Kw::Fn,
        "let" => Kw::Let,
        "const" => Kw::Const,
        "true" => Kw::True,
        "false" => Kw::False,
        "null" => Kw::Null,
        "if" => Kw::If,
        "else" => Kw::Else,
        "return" => Kw::Return,
        "for" => Kw::For,
        "while" => Kw::While,
        "in" => Kw::In,
        "continue" => Kw::Continue,
        "break" => Kw::Break,
        "and" => Kw::And,
        "or" => Kw::Or,
        "switch" => Kw::Switch,
        "case" => Kw::Case,
        "default" => Kw::Default,
        "on" => Kw::On,
        "catch" => Kw::Catch,
        "error" => Kw::Error,
        "class" => Kw::Class,
        "self" => Kw::SelfValue,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
