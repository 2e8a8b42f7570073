use std::fmt;

use thiserror::Error;

/// A 1-based line/column location in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexical,
    Syntax,
    Value,
    Scope,
    Runtime,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Lexical => "LexicalError",
            DiagnosticKind::Syntax => "SyntaxError",
            DiagnosticKind::Value => "ValueError",
            DiagnosticKind::Scope => "ScopeError",
            DiagnosticKind::Runtime => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Option<Position>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
            notes: Vec::new(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime, message)
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Attaches `position` unless the diagnostic already points somewhere
    /// more specific.
    pub fn or_position(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{} at {}: {}", self.kind, position, self.message)?,
            None => write!(f, "{}: {}", self.kind, self.message)?,
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Lynx toolchain.
#[derive(Debug, Error)]
pub enum LynxError {
    #[error("{}", render_all(.0))]
    Diagnostics(Vec<Diagnostic>),
    #[error("{0}")]
    Runtime(Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LynxError {
    /// Every diagnostic carried by this error, in report order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            LynxError::Diagnostics(list) => list.clone(),
            LynxError::Runtime(diagnostic) => vec![diagnostic.clone()],
            LynxError::Io(err) => vec![Diagnostic::runtime(err.to_string())],
        }
    }
}

fn render_all(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, LynxError>;
