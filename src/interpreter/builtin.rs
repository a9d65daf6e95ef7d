use std::io::{self, stdin, stdout, BufRead, Read, Write};

use super::callable::{NativeFn, NativeFunction};
use super::environment::Environment;
use super::object::{Object, RuntimeError, NULL};

fn expect_arity(name: &str, args: &[Object], arity: usize) -> Result<(), RuntimeError> {
    if args.len() != arity {
        let plural = if arity == 1 { "argument" } else { "arguments" };
        return Err(RuntimeError::Native(format!(
            "{}: expected {} {}, got {}",
            name,
            arity,
            plural,
            args.len()
        )));
    }
    Ok(())
}

fn len(args: Vec<Object>) -> Result<Object, RuntimeError> {
    expect_arity("len", &args, 1)?;
    match &args[0] {
        Object::String(s) => Ok(Object::int(s.chars().count() as i64)),
        other => Err(RuntimeError::Native(format!(
            "len: unsupported type {}",
            other.type_name()
        ))),
    }
}

fn abs(args: Vec<Object>) -> Result<Object, RuntimeError> {
    expect_arity("abs", &args, 1)?;
    match &args[0] {
        Object::Integer { value, width } => Ok(Object::Integer {
            value: value.wrapping_abs(),
            width: *width,
        }),
        other => Err(RuntimeError::Native(format!(
            "abs: expected an integer, got {}",
            other.type_name()
        ))),
    }
}

// End of input reads as the empty string
fn readline(args: Vec<Object>) -> Result<Object, RuntimeError> {
    expect_arity("readline", &args, 0)?;
    let mut line = String::new();
    stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| RuntimeError::Io(err.to_string()))?;
    Ok(Object::string(line.trim_end_matches(&['\r', '\n'][..])))
}

fn readchar(args: Vec<Object>) -> Result<Object, RuntimeError> {
    expect_arity("readchar", &args, 0)?;
    let mut stdin = stdin().lock();
    let mut buf = [0u8; 4];
    if stdin.read(&mut buf[..1]).map_err(|err| RuntimeError::Io(err.to_string()))? == 0 {
        return Ok(Object::string(""));
    }
    // Pull in the continuation bytes of a multi-byte character
    let width = match buf[0] {
        0xf0..=0xff => 4,
        0xe0..=0xef => 3,
        0xc0..=0xdf => 2,
        _ => 1,
    };
    if width > 1 {
        stdin
            .read_exact(&mut buf[1..width])
            .map_err(|err| RuntimeError::Io(err.to_string()))?;
    }
    Ok(Object::string(String::from_utf8_lossy(&buf[..width])))
}

// Each argument is followed by a space, then the line ends
fn write_arguments<W: Write>(out: &mut W, args: &[Object]) -> io::Result<()> {
    for arg in args {
        write!(out, "{} ", arg.inspect())?;
    }
    writeln!(out)
}

fn print(args: Vec<Object>) -> Result<Object, RuntimeError> {
    write_arguments(&mut stdout().lock(), &args)
        .map_err(|err| RuntimeError::Io(err.to_string()))?;
    Ok(NULL)
}

const BUILTINS: [(&str, NativeFn); 5] = [
    ("len", len),
    ("abs", abs),
    ("readline", readline),
    ("readchar", readchar),
    ("Print", print),
];

/// Bind the native library into the given (root) environment
pub fn populate_builtin(global_env: &Environment) {
    for (name, call) in BUILTINS {
        global_env.bind(name, Object::Native(NativeFunction { name, call }));
    }
}
