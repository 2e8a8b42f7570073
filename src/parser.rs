use std::{mem, rc::Rc};

use crate::{
    ast::{
        Block, CasePattern, CatchHandler, Expr, ExprKind, FunctionLiteral, InfixOp, PrefixOp,
        Program, Stmt, StmtKind, SwitchCase,
    },
    diagnostics::{Diagnostic, DiagnosticKind, LynxError, Position},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// Parsing halts once more than this many errors have been collected.
pub const MAX_ERRORS: usize = 10;

type ParseResult<T> = Result<T, Diagnostic>;

/// Parses a whole program, reporting lexical errors ahead of parse errors.
pub fn parse_program(source: &str) -> Result<Program, LynxError> {
    let mut parser = Parser::new(Lexer::new(source));
    let (program, errors) = parser.parse();
    let mut diagnostics = parser.lexical_errors().to_vec();
    diagnostics.extend(errors);
    if diagnostics.is_empty() {
        Ok(program)
    } else {
        Err(LynxError::Diagnostics(diagnostics))
    }
}

/// Parses source text consisting of exactly one expression.
pub fn parse_expression(source: &str) -> Result<Expr, LynxError> {
    let mut parser = Parser::new(Lexer::new(source));
    let parsed = parser.parse_expression(Precedence::Lowest);
    let mut diagnostics = parser.lexical_errors().to_vec();
    match parsed {
        Ok(expr) => {
            parser.matches(TokenKind::Semicolon);
            if !parser.check(TokenKind::Eof) {
                diagnostics.push(parser.unexpected());
            }
            if diagnostics.is_empty() {
                return Ok(expr);
            }
        }
        Err(diag) => diagnostics.push(diag),
    }
    Err(LynxError::Diagnostics(diagnostics))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Pipe,
    Compare,
    Equals,
    LessGreaterEqual,
    Concat,
    Sqrt,
    Logical,
    Sum,
    Product,
    Prefix,
    Call,
}

fn precedence_of(kind: &TokenKind) -> Precedence {
    match kind {
        TokenKind::PipeArrow => Precedence::Pipe,
        TokenKind::Less | TokenKind::Greater | TokenKind::Keyword(Keyword::In) => {
            Precedence::Compare
        }
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equals,
        TokenKind::LessEqual | TokenKind::GreaterEqual => Precedence::LessGreaterEqual,
        TokenKind::Concat | TokenKind::DotDot | TokenKind::DotDotEqual => Precedence::Concat,
        TokenKind::Dollar => Precedence::Sqrt,
        TokenKind::Keyword(Keyword::And) | TokenKind::Keyword(Keyword::Or) | TokenKind::Pipe => {
            Precedence::Logical
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent | TokenKind::Caret => {
            Precedence::Product
        }
        TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

fn infix_op(kind: &TokenKind) -> Option<InfixOp> {
    let op = match kind {
        TokenKind::Plus => InfixOp::Add,
        TokenKind::Minus => InfixOp::Sub,
        TokenKind::Star => InfixOp::Mul,
        TokenKind::Slash => InfixOp::Div,
        TokenKind::Percent => InfixOp::Mod,
        TokenKind::Caret => InfixOp::Pow,
        TokenKind::Dollar => InfixOp::Sqrt,
        TokenKind::Less => InfixOp::Less,
        TokenKind::Greater => InfixOp::Greater,
        TokenKind::LessEqual => InfixOp::LessEqual,
        TokenKind::GreaterEqual => InfixOp::GreaterEqual,
        TokenKind::EqualEqual => InfixOp::Equal,
        TokenKind::BangEqual => InfixOp::NotEqual,
        TokenKind::Keyword(Keyword::And) => InfixOp::And,
        TokenKind::Keyword(Keyword::Or) | TokenKind::Pipe => InfixOp::Or,
        TokenKind::Concat => InfixOp::Concat,
        TokenKind::Keyword(Keyword::In) => InfixOp::In,
        TokenKind::DotDot => InfixOp::Range,
        TokenKind::DotDotEqual => InfixOp::RangeInclusive,
        _ => return None,
    };
    Some(op)
}

/// Statement-level recursive descent with a Pratt expression core, reading
/// the scanner two tokens ahead.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    peek: Token,
    consumed: usize,
    errors: Vec<Diagnostic>,
    halted: bool,
    loop_depth: usize,
    function_depth: usize,
    block_depth: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            current,
            peek,
            consumed: 0,
            errors: Vec::new(),
            halted: false,
            loop_depth: 0,
            function_depth: 0,
            block_depth: 0,
        }
    }

    /// Parses the remaining input. Errors are collected rather than
    /// returned early; the program holds every statement that parsed.
    pub fn parse(&mut self) -> (Program, Vec<Diagnostic>) {
        let statements = self.parse_statements(|_| false);
        tracing::debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        (Program { statements }, mem::take(&mut self.errors))
    }

    pub fn lexical_errors(&self) -> &[Diagnostic] {
        self.lexer.errors()
    }

    fn parse_statements(&mut self, stop: impl Fn(&TokenKind) -> bool) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.halted && !self.check(TokenKind::Eof) && !stop(&self.current.kind) {
            let before = self.consumed;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(diag) => {
                    self.record(diag);
                    self.synchronize(before);
                }
            }
        }
        statements
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let position = self.current.position;
        let kind = match &self.current.kind {
            TokenKind::Keyword(Keyword::Let) => self.parse_var(false)?,
            TokenKind::Keyword(Keyword::Const) => self.parse_var(true)?,
            TokenKind::Keyword(Keyword::Return) => self.parse_return()?,
            TokenKind::Keyword(Keyword::For) => self.parse_for()?,
            TokenKind::Keyword(Keyword::While) => self.parse_while()?,
            TokenKind::Keyword(Keyword::Break) => self.parse_loop_control(true),
            TokenKind::Keyword(Keyword::Continue) => self.parse_loop_control(false),
            TokenKind::Keyword(Keyword::Class) => self.parse_class()?,
            TokenKind::At => self.parse_module_load()?,
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            _ => self.parse_expression_statement()?,
        };
        self.matches(TokenKind::Semicolon);
        Ok(Stmt { kind, position })
    }

    fn parse_var(&mut self, constant: bool) -> ParseResult<StmtKind> {
        self.advance();
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(StmtKind::Var {
            name,
            value,
            constant,
        })
    }

    fn parse_return(&mut self) -> ParseResult<StmtKind> {
        let token = self.advance();
        if self.function_depth == 0 {
            self.record(
                Diagnostic::new(
                    DiagnosticKind::Scope,
                    "'return' statement outside of function",
                )
                .with_position(token.position),
            );
        }
        let value = match self.current.kind {
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expression(Precedence::Lowest)?),
        };
        Ok(StmtKind::Return(value))
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let item = self.expect_identifier()?;
        let index = if self.matches(TokenKind::Comma) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect(TokenKind::Keyword(Keyword::In))?;
        let iterable = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_loop_body()?;
        Ok(StmtKind::For {
            item,
            index,
            iterable,
            body,
        })
    }

    fn parse_while(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_loop_body()?;
        Ok(StmtKind::While { condition, body })
    }

    fn parse_loop_body(&mut self) -> ParseResult<Block> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_loop_control(&mut self, is_break: bool) -> StmtKind {
        let token = self.advance();
        if self.loop_depth == 0 {
            let keyword = if is_break { "break" } else { "continue" };
            self.record(
                Diagnostic::new(
                    DiagnosticKind::Scope,
                    format!("'{keyword}' statement outside of loop"),
                )
                .with_position(token.position),
            );
        }
        if is_break {
            StmtKind::Break
        } else {
            StmtKind::Continue
        }
    }

    fn parse_class(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let name = self.expect_identifier()?;
        let superclass = if self.matches(TokenKind::LParen) {
            let parent = self.expect_identifier()?;
            self.expect(TokenKind::RParen)?;
            Some(parent)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(StmtKind::Class {
            name,
            superclass,
            body,
        })
    }

    fn parse_module_load(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let name = self.expect_identifier()?;
        let members = if self.matches(TokenKind::LParen) {
            let mut members = Vec::new();
            while !self.check(TokenKind::RParen) {
                members.push(self.expect_identifier()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            Some(members)
        } else {
            None
        };
        Ok(StmtKind::ModuleLoad { name, members })
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.check(TokenKind::Assign) {
            return Ok(StmtKind::Expr(expr));
        }
        if !expr.is_assignable() {
            return Err(self.error_at(expr.position, "Invalid assignment target"));
        }
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;
        let position = expr.position;
        Ok(StmtKind::Expr(Expr::new(
            ExprKind::Assign {
                target: Box::new(expr),
                value: Box::new(value),
            },
            position,
        )))
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        let open = self.expect(TokenKind::LBrace)?;
        self.block_depth += 1;
        let statements = self.parse_statements(|kind| *kind == TokenKind::RBrace);
        self.block_depth -= 1;
        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            statements,
            position: open.position,
        })
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;
        while precedence < precedence_of(&self.current.kind) {
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let position = self.current.position;
        let kind = match &self.current.kind {
            TokenKind::Identifier => ExprKind::Identifier(self.advance().lexeme),
            TokenKind::Integer => {
                let token = self.advance();
                let value = token.lexeme.parse::<i64>().map_err(|_| {
                    Diagnostic::new(
                        DiagnosticKind::Value,
                        format!("Cannot parse '{}' as integer", token.lexeme),
                    )
                    .with_position(token.position)
                })?;
                ExprKind::Integer(value)
            }
            TokenKind::Float => {
                let token = self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    Diagnostic::new(
                        DiagnosticKind::Value,
                        format!("Cannot parse '{}' as float", token.lexeme),
                    )
                    .with_position(token.position)
                })?;
                ExprKind::Float(value)
            }
            TokenKind::String => ExprKind::Str(self.advance().lexeme),
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Boolean(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Boolean(false)
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::Keyword(Keyword::SelfValue) => {
                self.advance();
                ExprKind::SelfRef
            }
            TokenKind::Bang | TokenKind::Minus | TokenKind::Dollar => {
                let op = match self.advance().kind {
                    TokenKind::Bang => PrefixOp::Not,
                    TokenKind::Minus => PrefixOp::Negate,
                    _ => PrefixOp::Sqrt,
                };
                let right = self.parse_expression(Precedence::Prefix)?;
                ExprKind::Prefix {
                    op,
                    right: Box::new(right),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                ExprKind::Array(self.parse_expression_list(TokenKind::RBracket)?)
            }
            TokenKind::LBrace => self.parse_hash_literal()?,
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::Fn) => self.parse_function_literal()?,
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch()?,
            TokenKind::Keyword(Keyword::Catch) => self.parse_catch()?,
            TokenKind::Keyword(Keyword::Error) => {
                self.advance();
                let message = self.parse_expression(Precedence::Lowest)?;
                ExprKind::Error(Box::new(message))
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, position))
    }

    fn parse_infix(&mut self, left: Expr) -> ParseResult<Expr> {
        let position = left.position;
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::PipeArrow => {
                let right = self.parse_expression(Precedence::Pipe)?;
                ExprKind::Pipe {
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            TokenKind::LParen => ExprKind::Call {
                function: Box::new(left),
                args: self.parse_expression_list(TokenKind::RParen)?,
            },
            TokenKind::LBracket => {
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(TokenKind::RBracket)?;
                ExprKind::Index {
                    target: Box::new(left),
                    index: Box::new(index),
                }
            }
            TokenKind::Dot => {
                let name = self.expect_identifier()?;
                if self.matches(TokenKind::LParen) {
                    ExprKind::MethodCall {
                        object: Box::new(left),
                        method: name,
                        args: self.parse_expression_list(TokenKind::RParen)?,
                    }
                } else {
                    ExprKind::Property {
                        object: Box::new(left),
                        name,
                    }
                }
            }
            ref other => {
                let Some(op) = infix_op(other) else {
                    return Err(self.error_at(
                        token.position,
                        format!("Unexpected token '{}'", token.kind.describe()),
                    ));
                };
                let right = self.parse_expression(precedence_of(other))?;
                ExprKind::Infix {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        };
        Ok(Expr::new(kind, position))
    }

    /// Comma separated expressions up to `end`, which is consumed. The
    /// opening delimiter has already been consumed.
    fn parse_expression_list(&mut self, end: TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.check(end.clone()) {
            items.push(self.parse_expression(Precedence::Lowest)?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(end)?;
        Ok(items)
    }

    fn parse_hash_literal(&mut self) -> ParseResult<ExprKind> {
        self.advance();
        let mut pairs = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let key = if self.check(TokenKind::Identifier) && self.peek.kind == TokenKind::Colon {
                let token = self.advance();
                Expr::new(ExprKind::Str(token.lexeme), token.position)
            } else {
                self.parse_expression(Precedence::Lowest)?
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ExprKind::Hash(pairs))
    }

    fn parse_if(&mut self) -> ParseResult<ExprKind> {
        self.advance();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let consequence = self.parse_block()?;
        let alternative = if self.matches(TokenKind::Keyword(Keyword::Else)) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                let position = self.current.position;
                let nested = Expr::new(self.parse_if()?, position);
                Some(Block {
                    statements: vec![Stmt {
                        kind: StmtKind::Expr(nested),
                        position,
                    }],
                    position,
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(ExprKind::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> ParseResult<ExprKind> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            if self.matches(TokenKind::Keyword(Keyword::SelfValue)) {
                params.push("self".to_string());
            } else {
                params.push(self.expect_identifier()?);
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let enclosing_loops = mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;

        Ok(ExprKind::Function(Rc::new(FunctionLiteral {
            params,
            body: body?,
        })))
    }

    fn parse_switch(&mut self) -> ParseResult<ExprKind> {
        self.advance();
        let subject = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let pattern = match self.current.kind {
                TokenKind::Keyword(Keyword::Case) => {
                    self.advance();
                    let binds = self.check(TokenKind::Identifier)
                        && matches!(
                            self.peek.kind,
                            TokenKind::Colon | TokenKind::Keyword(Keyword::If)
                        );
                    if binds {
                        CasePattern::Binding(self.advance().lexeme)
                    } else {
                        CasePattern::Value(self.parse_expression(Precedence::Lowest)?)
                    }
                }
                TokenKind::Keyword(Keyword::Default) => {
                    self.advance();
                    CasePattern::Default
                }
                _ => {
                    return Err(self.error_here(format!(
                        "Expected 'case' or 'default', got '{}'",
                        self.current_text()
                    )))
                }
            };
            let guard = if self.matches(TokenKind::Keyword(Keyword::If)) {
                Some(self.parse_expression(Precedence::Lowest)?)
            } else {
                None
            };
            self.expect(TokenKind::Colon)?;
            let body = self.parse_case_body()?;
            cases.push(SwitchCase {
                pattern,
                guard,
                body,
            });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ExprKind::Switch {
            subject: Box::new(subject),
            cases,
        })
    }

    fn parse_case_body(&mut self) -> ParseResult<Block> {
        if self.check(TokenKind::LBrace) {
            return self.parse_block();
        }
        let position = self.current.position;
        self.block_depth += 1;
        let statements = self.parse_statements(|kind| {
            matches!(
                kind,
                TokenKind::RBrace
                    | TokenKind::Keyword(Keyword::Case)
                    | TokenKind::Keyword(Keyword::Default)
            )
        });
        self.block_depth -= 1;
        Ok(Block {
            statements,
            position,
        })
    }

    fn parse_catch(&mut self) -> ParseResult<ExprKind> {
        self.advance();
        let body = self.parse_block()?;
        let handler = if self.matches(TokenKind::Keyword(Keyword::On)) {
            let name = self.expect_identifier()?;
            let body = self.parse_block()?;
            Some(CatchHandler { name, body })
        } else {
            None
        };
        Ok(ExprKind::Catch { body, handler })
    }

    /// Skips ahead to a plausible statement boundary after an error: a `;`,
    /// a statement keyword, or the first token on a later line. Always makes
    /// progress past the token that started the failure.
    fn synchronize(&mut self, consumed_before: usize) {
        let error_line = self.current.position.line;
        loop {
            let progressed = self.consumed > consumed_before;
            match self.current.kind {
                TokenKind::Eof => return,
                _ if progressed && self.current.position.line > error_line => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace if self.block_depth > 0 => return,
                TokenKind::Keyword(
                    Keyword::Let
                    | Keyword::Const
                    | Keyword::Return
                    | Keyword::For
                    | Keyword::While
                    | Keyword::Class
                    | Keyword::Break
                    | Keyword::Continue,
                )
                | TokenKind::At
                    if progressed =>
                {
                    return
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        if self.halted {
            return;
        }
        self.errors.push(diagnostic);
        if self.errors.len() > MAX_ERRORS {
            self.errors.push(
                Diagnostic::new(DiagnosticKind::Syntax, "Too many parse errors, stopping")
                    .with_position(self.current.position),
            );
            self.halted = true;
        }
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        let upcoming = mem::replace(&mut self.peek, next);
        self.consumed += 1;
        mem::replace(&mut self.current, upcoming)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "Expected '{}', got '{}'",
                kind.describe(),
                self.current_text()
            )))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        Ok(self.expect(TokenKind::Identifier)?.lexeme)
    }

    fn current_text(&self) -> &str {
        match self.current.kind {
            TokenKind::Eof => "end of input",
            _ => &self.current.lexeme,
        }
    }

    fn unexpected(&self) -> Diagnostic {
        self.error_here(format!("Unexpected token '{}'", self.current_text()))
    }

    fn error_here(&self, message: impl Into<String>) -> Diagnostic {
        self.error_at(self.current.position, message)
    }

    fn error_at(&self, position: Position, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Syntax, message).with_position(position)
    }
}
