use std::{
    env,
    fs::{self, read_dir},
    io::Write,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{bail, Context, Result};
use log::debug;

use super::{Environment, Interpreter, Object};
use crate::{parser::parse, scanner::Scanner, scanner::Syntax};

pub const LIBDIR_ENV: &str = "NIKIUM_LIBDIR";
pub const LIB_EXTENSION: &str = "nk";
/// Library files are written with indentation whatever syntax the program uses
pub const LIB_SYNTAX: Syntax = Syntax::Indentation;

/// `$NIKIUM_LIBDIR` when set, otherwise `./stdlib` if that directory exists
pub fn default_libdir() -> Option<PathBuf> {
    if let Some(libdir) = env::var_os(LIBDIR_ENV) {
        return Some(PathBuf::from(libdir));
    }
    let local = PathBuf::from("stdlib");
    if local.is_dir() {
        Some(local)
    } else {
        None
    }
}

/// Evaluate every library file of `libdir`, in file name order, into `env`. Any parse or
/// runtime error aborts loading. Returns the number of files loaded
pub fn load_stdlib<W: Write>(
    libdir: &Path,
    interpreter: &mut Interpreter<W>,
    env: &Rc<Environment>,
) -> Result<usize> {
    let mut paths = Vec::new();
    let entries = read_dir(libdir)
        .with_context(|| format!("Unable to read library directory {}", libdir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == LIB_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    for path in &paths {
        debug!("loading library file {}", path.display());
        let script = fs::read_to_string(path)
            .with_context(|| format!("Unable to read library file {}", path.display()))?;
        let (program, errors) = parse(Scanner::new(&script, LIB_SYNTAX));
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("{}: {}", path.display(), messages.join("; "));
        }
        if let Object::Error(error) = interpreter.eval_program(&program, env) {
            bail!("{}: {}", path.display(), error);
        }
    }
    Ok(paths.len())
}
