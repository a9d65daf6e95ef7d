pub mod ast;
pub mod interpreter;
pub mod parser;
pub mod repl;
pub mod reporter;
pub mod scanner;
pub mod token;
