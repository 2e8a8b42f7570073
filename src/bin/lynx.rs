use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;

use lynx::{logging, ExecutionContext, Interpreter, LynxError, Repl, Value, ValueKind};

#[derive(Parser)]
#[command(author, version, about = "Lynx language interpreter")]
struct Args {
    /// Log at debug level
    #[arg(short, long)]
    debug: bool,
    /// Log at info level
    #[arg(short, long)]
    verbose: bool,
    /// Script to run; starts the REPL when omitted
    script: Option<PathBuf>,
    /// Arguments passed to the script as `args`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.debug {
        Some("debug")
    } else if args.verbose {
        Some("info")
    } else {
        None
    };
    logging::init_tracing(level);

    let context = ExecutionContext {
        args: args.script_args,
        ..ExecutionContext::default()
    };
    match args.script {
        Some(script) => run_script(&script, context),
        None => match Repl::with_context(context).run() {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
    }
}

fn run_script(path: &Path, mut context: ExecutionContext) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: could not read {}: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };
    context.script_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tracing::info!(script = %path.display(), "running script");

    let mut interpreter = Interpreter::with_context(context);
    match interpreter.eval_source(&source) {
        Ok(value) if value.is_error() => return report_error_value(&value),
        Ok(_) => {}
        Err(err) => return report(err),
    }

    let Some(main) = interpreter.global("main") else {
        return ExitCode::SUCCESS;
    };
    let call_args = match main.kind() {
        ValueKind::Function(function) => match function.params().len() {
            0 => Vec::new(),
            1 => vec![interpreter.global("args").unwrap_or_else(Value::null)],
            n => {
                eprintln!("Error: main must take 0 or 1 parameters, found {n}");
                return ExitCode::FAILURE;
            }
        },
        _ => return ExitCode::SUCCESS,
    };
    match interpreter.call(&main, call_args) {
        Ok(value) => match value.kind() {
            ValueKind::Integer(code) => ExitCode::from(exit_status(*code)),
            ValueKind::Error(_) => report_error_value(&value),
            _ => ExitCode::SUCCESS,
        },
        Err(err) => report(err),
    }
}

/// Narrows `main`'s result to a process status. Values above 255 clamp to
/// 255 and negative values report plain failure, so no non-zero result
/// reads as success.
fn exit_status(code: i64) -> u8 {
    u8::try_from(code).unwrap_or(if code < 0 { 1 } else { u8::MAX })
}

fn report(err: LynxError) -> ExitCode {
    match err {
        LynxError::Diagnostics(diagnostics) => {
            for diagnostic in diagnostics {
                eprintln!("{diagnostic}");
            }
        }
        LynxError::Runtime(diagnostic) => {
            eprintln!("Error: {}", diagnostic.message);
            if let Some(position) = diagnostic.position {
                eprintln!("  at {position}");
            }
        }
        LynxError::Io(err) => eprintln!("Error: {err}"),
    }
    ExitCode::FAILURE
}

fn report_error_value(value: &Value) -> ExitCode {
    if let ValueKind::Error(message) = value.kind() {
        eprintln!("Error: {message}");
    }
    ExitCode::FAILURE
}
