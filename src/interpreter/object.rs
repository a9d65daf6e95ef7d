use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use thiserror::Error;

use super::callable::{Function, NativeFunction};
use crate::ast::{BinaryOp, IntWidth, TypeAnnotation, UnaryOp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch {
        left: &'static str,
        op: BinaryOp,
        right: &'static str,
    },
    #[error("unknown operator: {left} {op} {right}")]
    UnknownInfixOperator {
        left: &'static str,
        op: BinaryOp,
        right: &'static str,
    },
    #[error("unknown operator: {op}{operand}")]
    UnknownPrefixOperator { op: UnaryOp, operand: &'static str },
    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),
    #[error("not a function: {0}")]
    NotAFunction(&'static str),
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("stack overflow: more than {0} nested calls")]
    StackOverflow(usize),
    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),
    #[error("index must be an INTEGER, got {0}")]
    InvalidIndex(&'static str),
    #[error("cannot bind {found} to {name}: {annotation}")]
    AnnotationMismatch {
        name: String,
        annotation: TypeAnnotation,
        found: &'static str,
    },
    #[error("value {value} of {name} does not fit in i32")]
    WidthOverflow { name: String, value: i64 },
    #[error("io error: {0}")]
    Io(String),
    // Raised by native functions validating their own arguments
    #[error("{0}")]
    Native(String),
}

/// A runtime value
#[derive(Clone)]
pub enum Object {
    Integer { value: i64, width: IntWidth },
    String(Rc<String>),
    Boolean(bool),
    Null,
    Error(RuntimeError),
    Function(Rc<Function>),
    Native(NativeFunction),
}

pub const NULL: Object = Object::Null;
pub const TRUE: Object = Object::Boolean(true);
pub const FALSE: Object = Object::Boolean(false);

impl Object {
    pub fn int(value: i64) -> Object {
        Object::Integer {
            value,
            width: IntWidth::I64,
        }
    }

    pub fn string(value: impl Into<String>) -> Object {
        Object::String(Rc::new(value.into()))
    }

    pub fn bool(value: bool) -> Object {
        if value {
            TRUE
        } else {
            FALSE
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer { .. } => "INTEGER",
            Object::String(_) => "STRING",
            Object::Boolean(_) => "BOOLEAN",
            Object::Null => "NULL",
            Object::Error(_) => "ERROR",
            Object::Function(_) => "FUNCTION",
            Object::Native(_) => "BUILTIN",
        }
    }

    /// Only null and false are falsy; integer zero and the empty string are truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// The form shown by `print` and echoed by the shell
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer { value, .. } => write!(f, "{}", value),
            Object::String(s) => f.write_str(s),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::Null => f.write_str("null"),
            Object::Error(error) => write!(f, "ERROR: {}", error),
            Object::Function(func) => write!(f, "fn({})", func.parameters.join(", ")),
            Object::Native(native) => write!(f, "<builtin {}>", native.name),
        }
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer { value, width } => write!(f, "Object::Integer({}{})", value, width),
            Object::String(s) => write!(f, "Object::String({:?})", s),
            Object::Boolean(b) => write!(f, "Object::Boolean({})", b),
            Object::Null => f.write_str("Object::Null"),
            Object::Error(error) => write!(f, "Object::Error({:?})", error.to_string()),
            Object::Function(func) => write!(f, "Object::Function({})", func.parameters.join(", ")),
            Object::Native(native) => write!(f, "Object::Native({})", native.name),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Width is a tag, not part of the value
            (Object::Integer { value: l, .. }, Object::Integer { value: r, .. }) => l == r,
            (Object::String(l), Object::String(r)) => l == r,
            (Object::Boolean(l), Object::Boolean(r)) => l == r,
            (Object::Null, Object::Null) => true,
            (Object::Error(l), Object::Error(r)) => l == r,
            (Object::Function(l), Object::Function(r)) => Rc::ptr_eq(l, r),
            (Object::Native(l), Object::Native(r)) => l.name == r.name,
            _ => false,
        }
    }
}
