use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{LynxError, Result},
    runtime::{ExecutionContext, Interpreter},
};

pub const PROMPT: &str = "lynx> ";

const HELP: &str = "\
Enter Lynx statements to evaluate them.
Commands:
  help          show this message
  clear         clear the screen
  exit, quit    leave the session (also :exit, :quit)";

/// What the loop should do with one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Help,
    Clear,
    Skip,
    Eval,
}

impl Command {
    pub fn classify(line: &str) -> Self {
        match line.trim() {
            "exit" | "quit" | ":exit" | ":quit" => Command::Exit,
            "help" => Command::Help,
            "clear" => Command::Clear,
            "" => Command::Skip,
            _ => Command::Eval,
        }
    }
}

pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        Self {
            interpreter: Interpreter::with_context(context),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        println!("Lynx REPL. Type 'help' for commands, 'exit' to quit.");
        loop {
            match editor.readline(PROMPT) {
                Ok(line) => match Command::classify(&line) {
                    Command::Exit => break,
                    Command::Skip => continue,
                    Command::Help => println!("{HELP}"),
                    Command::Clear => {
                        editor.clear_screen().map_err(readline_error)?;
                    }
                    Command::Eval => {
                        let trimmed = line.trim();
                        editor.add_history_entry(trimmed).ok();
                        self.eval_line(trimmed);
                    }
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }

    /// Evaluates one line, printing non-null results and any errors. The
    /// session's bindings survive failures.
    pub fn eval_line(&mut self, line: &str) {
        match self.interpreter.eval_source(line) {
            Ok(value) if value.is_null() => {}
            Ok(value) => println!("{value}"),
            Err(LynxError::Diagnostics(diagnostics)) => {
                for diagnostic in diagnostics {
                    eprintln!("{diagnostic}");
                }
            }
            Err(LynxError::Runtime(diagnostic)) => eprintln!("Error: {}", diagnostic.message),
            Err(other) => eprintln!("error: {other}"),
        }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }
}

fn readline_error(err: ReadlineError) -> LynxError {
    LynxError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
