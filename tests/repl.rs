use lynx::repl::{Command, Repl, PROMPT};

#[test]
fn classifies_session_commands() {
    for line in ["exit", "quit", ":exit", " :quit "] {
        assert_eq!(Command::classify(line), Command::Exit, "{line:?}");
    }
    assert_eq!(Command::classify("help"), Command::Help);
    assert_eq!(Command::classify("clear"), Command::Clear);
    assert_eq!(Command::classify("   "), Command::Skip);
    assert_eq!(Command::classify("let exit = 1"), Command::Eval);
    assert_eq!(PROMPT, "lynx> ");
}

#[test]
fn bindings_survive_failed_lines() {
    let mut repl = Repl::new();
    repl.eval_line("let total = 40");
    repl.eval_line("total = total + missing");
    repl.eval_line("let = broken");
    repl.eval_line("total = total + 2");
    let total = repl.interpreter().global("total").expect("total is bound");
    assert_eq!(total.to_string(), "42");
}
