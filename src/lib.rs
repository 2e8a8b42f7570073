//! Core library for the Lynx scripting language: scanner, Pratt parser,
//! tree-walking evaluator, module loader and REPL.

pub mod ast;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod logging;
mod methods;
pub mod modules;
pub mod operators;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, LynxError, Position};
pub use modules::{ModuleCache, ModuleSearch};
pub use repl::Repl;
pub use runtime::{ExecutionContext, Interpreter};
pub use value::{Value, ValueKind};
