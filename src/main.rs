use std::fs;
use std::io::{stderr, stdout};
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::debug;
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

use nikium::interpreter::{default_libdir, load_stdlib, stock_environment, Environment};
use nikium::interpreter::{Interpreter, Object};
use nikium::parser::parse;
use nikium::repl;
use nikium::reporter::{Reporter, WriteReporter};
use nikium::scanner::{Scanner, Syntax};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SyntaxArg {
    Indentation,
    Braces,
}

impl From<SyntaxArg> for Syntax {
    fn from(arg: SyntaxArg) -> Syntax {
        match arg {
            SyntaxArg::Indentation => Syntax::Indentation,
            SyntaxArg::Braces => Syntax::Braces,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Script to run. Starts the interactive shell when absent
    script: Option<PathBuf>,

    /// Block syntax used by the script, the shell and library files
    #[arg(long, value_enum, default_value_t = SyntaxArg::Indentation)]
    syntax: SyntaxArg,

    /// Library directory evaluated before anything else.
    /// Defaults to $NIKIUM_LIBDIR, or ./stdlib when it exists
    #[arg(long, value_name = "DIR")]
    stdlib: Option<PathBuf>,

    /// Do not load any library directory
    #[arg(long, conflicts_with = "stdlib")]
    no_stdlib: bool,

    /// Print the tokens of the script and exit
    #[arg(long, requires = "script")]
    tokens: bool,

    /// Print the parsed program of the script and exit
    #[arg(long, requires = "script", conflicts_with = "tokens")]
    ast: bool,

    /// Show debug output
    #[arg(short, long)]
    debug: bool,

    /// Show every scanned token
    #[arg(long)]
    trace: bool,
}

// Exit statuses for a script that fails to parse or to run
const EXIT_PARSE_ERROR: i32 = 65;
const EXIT_RUNTIME_ERROR: i32 = 70;

// Room for the interpreter's full call depth, beyond what the main thread gets
const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

fn init_logging(args: &Args) -> Result<()> {
    let filter = if args.trace {
        LevelFilter::Trace
    } else if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn dump_tokens(script: &str, syntax: Syntax) {
    for token in Scanner::new(script, syntax) {
        println!("{} {}", token.pos, token);
    }
}

fn run_file(script: &str, syntax: Syntax, env: &Rc<Environment>) {
    let mut reporter = WriteReporter::new(stderr());
    let (program, errors) = parse(Scanner::new(script, syntax));
    if !errors.is_empty() {
        reporter.parse_errors(&errors);
        process::exit(EXIT_PARSE_ERROR);
    }
    let mut interpreter = Interpreter::new(stdout());
    if let Object::Error(e) = interpreter.eval_program(&program, env) {
        reporter.runtime_error(&e);
        process::exit(EXIT_RUNTIME_ERROR);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    let interpreter = thread::Builder::new()
        .name("interpreter".to_string())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || run(args))
        .context("Unable to start interpreter thread")?;
    match interpreter.join() {
        Ok(result) => result,
        Err(_) => bail!("Interpreter thread panicked"),
    }
}

fn run(args: Args) -> Result<()> {
    let syntax = Syntax::from(args.syntax);

    let script = match &args.script {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Unable to read script file {}", path.display()))?,
        ),
        None => None,
    };

    if let Some(script) = &script {
        if args.tokens {
            dump_tokens(script, syntax);
            return Ok(());
        }
        if args.ast {
            let (program, errors) = parse(Scanner::new(script, syntax));
            if !errors.is_empty() {
                WriteReporter::new(stderr()).parse_errors(&errors);
                process::exit(EXIT_PARSE_ERROR);
            }
            print!("{}", program);
            return Ok(());
        }
    }

    let env = stock_environment();
    let libdir = if args.no_stdlib {
        None
    } else {
        args.stdlib.clone().or_else(default_libdir)
    };
    if let Some(libdir) = libdir {
        let mut interpreter = Interpreter::new(stdout());
        let loaded = load_stdlib(&libdir, &mut interpreter, &env)
            .context("Unable to load stdlib")?;
        debug!("loaded {} library files from {}", loaded, libdir.display());
    }

    match script {
        Some(script) => {
            run_file(&script, syntax, &env);
            Ok(())
        }
        None => repl::run(syntax, env),
    }
}
