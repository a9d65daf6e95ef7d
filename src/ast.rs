use std::fmt::{self, Display, Formatter};

use crate::token::Token;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program(pub Vec<Stmt>);

impl Program {
    pub fn token_literal(&self) -> &str {
        self.0
            .first()
            .map(|stmt| stmt.token_literal())
            .unwrap_or("")
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for stmt in &self.0 {
            writeln!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    // The token that started the statement, kept for diagnostics
    pub token: Token,
    pub inner: StmtInner,
}

impl Stmt {
    pub fn token_literal(&self) -> &str {
        &self.token.literal
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtInner {
    Let {
        name: String,
        annotation: Option<TypeAnnotation>,
        value: Expr,
    },
    Print(Expr),
    Return(Option<Expr>),
    Expr(Expr),
    If(IfStatement),
    While(WhileStatement),
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.inner {
            StmtInner::Let {
                name,
                annotation: Some(annotation),
                value,
            } => write!(f, "{}: {} = {}", name, annotation, value),
            StmtInner::Let {
                name,
                annotation: None,
                value,
            } => write!(f, "{} = {}", name, value),
            StmtInner::Print(expr) => write!(f, "print {}", expr),
            StmtInner::Return(Some(expr)) => write!(f, "return {}", expr),
            StmtInner::Return(None) => f.write_str("return"),
            StmtInner::Expr(expr) => write!(f, "{}", expr),
            StmtInner::If(if_stmt) => write!(f, "{}", if_stmt),
            StmtInner::While(while_stmt) => write!(f, "{}", while_stmt),
        }
    }
}

/// A sequence of statements forming the body of an if, while or function
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub token: Token,
    pub statements: Vec<Stmt>,
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.statements.is_empty() {
            return f.write_str("{ }");
        }
        f.write_str("{ ")?;
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", stmt)?;
        }
        f.write_str(" }")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfStatement {
    pub condition: Expr,
    pub consequence: Block,
    pub alternative: Option<Block>,
}

impl Display for IfStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "if {} {}", self.condition, self.consequence)?;
        if let Some(alternative) = &self.alternative {
            write!(f, " else {}", alternative)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhileStatement {
    pub condition: Expr,
    pub body: Block,
}

impl Display for WhileStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "while {} {}", self.condition, self.body)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub token: Token,
    pub inner: ExprInner,
}

impl Expr {
    pub fn token_literal(&self) -> &str {
        &self.token.literal
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprInner {
    Identifier(String),
    Integer {
        value: i64,
        width: IntWidth,
    },
    String(String),
    Boolean(bool),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Function {
        parameters: Vec<String>,
        body: Block,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Index {
        collection: Box<Expr>,
        index: Box<Expr>,
    },
    // if and while are also usable where a value is expected
    If(Box<IfStatement>),
    While(Box<WhileStatement>),
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ExprInner::Identifier(name) => f.write_str(name),
            // Integers render as written so the width suffix survives
            ExprInner::Integer { .. } => f.write_str(&self.token.literal),
            ExprInner::String(s) => write!(f, "\"{}\"", s),
            ExprInner::Boolean(b) => write!(f, "{}", b),
            ExprInner::Unary { op, expr } => write!(f, "({}{})", op, expr),
            ExprInner::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            ExprInner::Function { parameters, body } => {
                write!(f, "fn({}) {}", parameters.join(", "), body)
            }
            ExprInner::Call { callee, arguments } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            ExprInner::Index { collection, index } => write!(f, "({}[{}])", collection, index),
            ExprInner::If(if_stmt) => write!(f, "{}", if_stmt),
            ExprInner::While(while_stmt) => write!(f, "{}", while_stmt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I32,
    I64,
}

impl Display for IntWidth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IntWidth::I32 => f.write_str("i32"),
            IntWidth::I64 => f.write_str("i64"),
        }
    }
}

/// The fixed set of names allowed after `:` in an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAnnotation {
    I32,
    I64,
    String,
}

impl TypeAnnotation {
    pub fn from_name(name: &str) -> Option<TypeAnnotation> {
        match name {
            "i32" => Some(TypeAnnotation::I32),
            "i64" => Some(TypeAnnotation::I64),
            "string" => Some(TypeAnnotation::String),
            _ => None,
        }
    }
}

impl Display for TypeAnnotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeAnnotation::I32 => f.write_str("i32"),
            TypeAnnotation::I64 => f.write_str("i64"),
            TypeAnnotation::String => f.write_str("string"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Equal => f.write_str("=="),
            BinaryOp::NotEqual => f.write_str("!="),
            BinaryOp::LessThan => f.write_str("<"),
            BinaryOp::GreaterThan => f.write_str(">"),
            BinaryOp::Add => f.write_str("+"),
            BinaryOp::Subtract => f.write_str("-"),
            BinaryOp::Multiply => f.write_str("*"),
            BinaryOp::Divide => f.write_str("/"),
            BinaryOp::Remainder => f.write_str("%"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negative,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("!"),
            UnaryOp::Negative => f.write_str("-"),
        }
    }
}
