use std::io::{stderr, stdout, Write};
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{config::Config as EditorConfig, Editor};
use rustyline::{Completer, Helper, Highlighter, Hinter};

use crate::interpreter::{Environment, Interpreter, Object};
use crate::parser::parse;
use crate::reporter::{Reporter, WriteReporter};
use crate::scanner::{Scanner, Syntax};
use crate::token::TokenKind;

pub const PROMPT: &str = ">>> ";
pub const HISTORY_FILE: &str = ".nikium_history";

/// Helper that extends editor
///
/// Only implements `Validator`, to keep reading lines while a block is still open.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper {
    syntax: Syntax,
}

impl ReplHelper {
    pub fn new(syntax: Syntax) -> Self {
        ReplHelper { syntax }
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if is_incomplete(ctx.input(), self.syntax) {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Whether more lines are needed before the input can be parsed.
///
/// With indentation, a line ending in `:` opens a block that runs until an empty line. With
/// braces, input continues while a `{` is unmatched.
pub fn is_incomplete(input: &str, syntax: Syntax) -> bool {
    match syntax {
        Syntax::Indentation => {
            let opens_block = input.lines().any(|line| line.trim_end().ends_with(':'));
            let closed_by_blank_line = input.contains('\n')
                && input
                    .rsplit('\n')
                    .next()
                    .map_or(false, |last| last.trim().is_empty());
            opens_block && !closed_by_blank_line
        }
        Syntax::Braces => {
            let depth = Scanner::new(input, Syntax::Braces).fold(0i64, |depth, token| {
                match token.kind {
                    TokenKind::LBrace => depth + 1,
                    TokenKind::RBrace => depth - 1,
                    _ => depth,
                }
            });
            depth > 0
        }
    }
}

/// Evaluation state kept between inputs of one shell session
pub struct Session<W> {
    interpreter: Interpreter<W>,
    env: Rc<Environment>,
    syntax: Syntax,
}

impl<W: Write> Session<W> {
    pub fn new(interpreter: Interpreter<W>, env: Rc<Environment>, syntax: Syntax) -> Session<W> {
        Session {
            interpreter,
            env,
            syntax,
        }
    }

    /// Parse and evaluate one input. Parse errors go to the reporter and nothing is evaluated.
    /// Returns the value worth echoing, if any; runtime errors are echoed as error objects
    pub fn eval_input(&mut self, input: &str, reporter: &mut dyn Reporter) -> Option<Object> {
        let (program, errors) = parse(Scanner::new(input, self.syntax));
        if !errors.is_empty() {
            reporter.parse_errors(&errors);
            return None;
        }
        let result = self.interpreter.eval_program(&program, &self.env);
        if result.is_null() {
            None
        } else {
            Some(result)
        }
    }

    pub fn into_inner(self) -> W {
        self.interpreter.into_inner()
    }
}

fn init_editor(syntax: Syntax) -> Result<Editor<ReplHelper, DefaultHistory>> {
    let config = EditorConfig::builder().auto_add_history(true).build();
    let mut editor = Editor::with_config(config).context("Unable to start line editor")?;
    editor.set_helper(Some(ReplHelper::new(syntax)));
    Ok(editor)
}

fn welcome(syntax: Syntax) {
    println!("Nikium v{}", env!("CARGO_PKG_VERSION"));
    match syntax {
        Syntax::Indentation => println!("Blocks open with ':' and end at an empty line"),
        Syntax::Braces => println!("Blocks are written in {{ }}"),
    }
    println!("Type 'exit' or 'quit' to leave");
    println!();
}

/// Run the interactive shell against `env` until the user quits
pub fn run(syntax: Syntax, env: Rc<Environment>) -> Result<()> {
    let mut editor = init_editor(syntax)?;
    let _ = editor.load_history(HISTORY_FILE);
    welcome(syntax);

    let mut session = Session::new(Interpreter::new(stdout()), env, syntax);
    let mut reporter = WriteReporter::new(stderr());
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                info!("read: {}", &line);
                match line.trim() {
                    "" => continue,
                    "exit" | "quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }
                if let Some(value) = session.eval_input(&line, &mut reporter) {
                    println!("{}", value.inspect());
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("Press Ctrl-D or type 'quit' to quit");
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = editor.save_history(HISTORY_FILE) {
        warn!("Failed to save history: {}", e);
    }
    Ok(())
}
