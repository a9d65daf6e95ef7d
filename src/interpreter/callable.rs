use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use super::environment::Environment;
use super::object::{Object, RuntimeError};
use crate::ast::Block;

/// A user-defined function together with the scope it was defined in
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Block,
    pub closure: Rc<Environment>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Open the call scope: a fresh environment enclosed by the captured one, with every
    /// parameter bound positionally
    pub fn bind_arguments(&self, args: Vec<Object>) -> Result<Rc<Environment>, RuntimeError> {
        if args.len() != self.arity() {
            return Err(RuntimeError::ArityMismatch {
                expected: self.arity(),
                got: args.len(),
            });
        }
        let env = self.closure.open_scope();
        for (parameter, value) in self.parameters.iter().zip(args) {
            env.bind(parameter, value);
        }
        Ok(env)
    }
}

pub type NativeFn = fn(Vec<Object>) -> Result<Object, RuntimeError>;

// Natives check their own arguments, the evaluator passes them through untouched
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub call: NativeFn,
}

impl NativeFunction {
    pub fn call(&self, args: Vec<Object>) -> Result<Object, RuntimeError> {
        (self.call)(args)
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}
