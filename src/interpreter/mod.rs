mod builtin;
mod callable;
mod environment;
mod evaluator;
mod object;
mod stdlib;

use std::rc::Rc;

pub use builtin::populate_builtin;
pub use callable::{Function, NativeFn, NativeFunction};
pub use environment::Environment;
pub use evaluator::{Interpreter, Unwind, DEFAULT_MAX_CALL_DEPTH};
pub use object::{Object, RuntimeError, FALSE, NULL, TRUE};
pub use stdlib::{default_libdir, load_stdlib, LIBDIR_ENV, LIB_EXTENSION, LIB_SYNTAX};

/// A root environment seeded with the native library
pub fn stock_environment() -> Rc<Environment> {
    let global_env = Environment::new_global();
    populate_builtin(&global_env);
    global_env
}
