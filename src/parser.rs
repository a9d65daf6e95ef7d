use log::debug;
use thiserror::Error;

use crate::ast::*;
use crate::scanner::{Scanner, Syntax};
use crate::token::{Pos, Token, TokenKind};

/// A diagnostic produced while parsing. Parsing never stops at the first one
#[derive(Clone, Error, Debug, PartialEq, Eq)]
#[error("{pos}: {message}")]
pub struct ParseError {
    pub pos: Pos,
    pub message: String,
}

// For unwinding, we don't actually care about the cause which is already recorded in the error list
#[derive(Debug)]
struct ParsePanic;

type ParseResult<T> = Result<T, ParsePanic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        TokenKind::LParen | TokenKind::LBracket => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

fn kind_to_binary_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Eq => Some(BinaryOp::Equal),
        TokenKind::NotEq => Some(BinaryOp::NotEqual),
        TokenKind::Lt => Some(BinaryOp::LessThan),
        TokenKind::Gt => Some(BinaryOp::GreaterThan),
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Subtract),
        TokenKind::Asterisk => Some(BinaryOp::Multiply),
        TokenKind::Slash => Some(BinaryOp::Divide),
        TokenKind::Percent => Some(BinaryOp::Remainder),
        _ => None,
    }
}

/// Parse a whole source text, returning the (possibly partial) program along with every
/// diagnostic found. A non-empty error list means the tree should not be trusted
pub fn parse(scanner: Scanner<'_>) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(scanner);
    let program = parser.parse_program();
    (program, parser.into_errors())
}

pub struct Parser<'src> {
    scanner: Scanner<'src>,
    syntax: Syntax,
    current: Token,
    peek: Token,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    pub fn new(mut scanner: Scanner<'src>) -> Parser<'src> {
        let syntax = scanner.syntax();
        let current = scanner.next_token();
        let peek = scanner.next_token();
        Parser {
            scanner,
            syntax,
            current,
            peek,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    pub fn parse_program(&mut self) -> Program {
        let mut stmts = Vec::new();
        while !self.current_is(TokenKind::Eof) {
            self.statement_into(&mut stmts);
            self.next_token();
        }
        debug!(
            "parsed {} statements with {} errors",
            stmts.len(),
            self.errors.len()
        );
        Program(stmts)
    }

    fn next_token(&mut self) {
        let next = self.scanner.next_token();
        self.current = std::mem::replace(&mut self.peek, next);
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current.is(kind)
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.is(kind)
    }

    fn report(&mut self, pos: Pos, message: String) -> ParsePanic {
        self.errors.push(ParseError { pos, message });
        ParsePanic
    }

    /// Advance onto the peeked token if it has the expected kind, otherwise record what was found
    fn expect_peek(&mut self, kind: TokenKind) -> ParseResult<()> {
        if self.peek_is(kind) {
            self.next_token();
            Ok(())
        } else {
            let pos = self.peek.pos;
            let message = format!(
                "expected next token to be {}, got {} instead",
                kind, self.peek.kind
            );
            Err(self.report(pos, message))
        }
    }

    /// With indentation, newlines carry no token, so a statement ends where its line does. A
    /// DEDENT sits on the line that follows the block it closes
    fn at_line_end(&self) -> bool {
        self.syntax == Syntax::Indentation
            && (self.current_is(TokenKind::Dedent) || self.peek.pos.line != self.current.pos.line)
    }

    fn skip_semicolon(&mut self) {
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
    }

    // Failed statements are already reported, so they are simply left out of the tree
    fn statement_into(&mut self, stmts: &mut Vec<Stmt>) {
        if self.current_is(TokenKind::Semicolon) {
            return;
        }
        if let Ok(stmt) = self.parse_statement() {
            stmts.push(stmt);
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.current.clone();
        let inner = match token.kind {
            TokenKind::Ident if self.peek_is(TokenKind::Assign) || self.peek_is(TokenKind::Colon) => {
                self.parse_let()?
            }
            TokenKind::Print => {
                self.next_token();
                let value = self.parse_expression(Precedence::Lowest)?;
                self.skip_semicolon();
                StmtInner::Print(value)
            }
            TokenKind::Return => self.parse_return()?,
            TokenKind::If => StmtInner::If(self.parse_if()?),
            TokenKind::While => StmtInner::While(self.parse_while()?),
            _ => {
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.skip_semicolon();
                StmtInner::Expr(expr)
            }
        };
        Ok(Stmt { token, inner })
    }

    fn parse_let(&mut self) -> ParseResult<StmtInner> {
        let name = self.current.literal.clone();
        let annotation = if self.peek_is(TokenKind::Colon) {
            self.next_token();
            self.expect_peek(TokenKind::Ident)?;
            match TypeAnnotation::from_name(&self.current.literal) {
                Some(annotation) => Some(annotation),
                None => {
                    let pos = self.current.pos;
                    let message = format!(
                        "unknown type {}, expected one of i32, i64, string",
                        self.current.literal
                    );
                    return Err(self.report(pos, message));
                }
            }
        } else {
            None
        };
        self.expect_peek(TokenKind::Assign)?;
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_semicolon();
        Ok(StmtInner::Let {
            name,
            annotation,
            value,
        })
    }

    fn parse_return(&mut self) -> ParseResult<StmtInner> {
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
            return Ok(StmtInner::Return(None));
        }
        // A bare return closing a block, or ending its line
        if self.at_line_end()
            || matches!(
                self.peek.kind,
                TokenKind::RBrace | TokenKind::Dedent | TokenKind::Else | TokenKind::Eof
            )
        {
            return Ok(StmtInner::Return(None));
        }
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_semicolon();
        Ok(StmtInner::Return(Some(value)))
    }

    fn parse_if(&mut self) -> ParseResult<IfStatement> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let consequence = self.parse_block()?;
        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            if self.peek_is(TokenKind::If) {
                // else if: the trailing if statement becomes the whole alternative
                self.next_token();
                let token = self.current.clone();
                let nested = self.parse_if()?;
                Some(Block {
                    token: token.clone(),
                    statements: vec![Stmt {
                        token,
                        inner: StmtInner::If(nested),
                    }],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(IfStatement {
            condition,
            consequence,
            alternative,
        })
    }

    fn parse_while(&mut self) -> ParseResult<WhileStatement> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        let body = self.parse_block()?;
        Ok(WhileStatement { condition, body })
    }

    /// Parse a block starting from the token before its opener. Leaves the closing `}` or
    /// DEDENT (or the last token of an inline block) as the current token
    fn parse_block(&mut self) -> ParseResult<Block> {
        match self.syntax {
            Syntax::Braces => {
                self.expect_peek(TokenKind::LBrace)?;
                let token = self.current.clone();
                let statements = self.block_statements(TokenKind::RBrace);
                Ok(Block { token, statements })
            }
            Syntax::Indentation => {
                self.expect_peek(TokenKind::Colon)?;
                let token = self.current.clone();
                if self.peek_is(TokenKind::Indent) {
                    self.next_token();
                    let statements = self.block_statements(TokenKind::Dedent);
                    Ok(Block { token, statements })
                } else {
                    // Inline block, a single statement on the same line as the ':'
                    self.next_token();
                    let stmt = self.parse_statement()?;
                    Ok(Block {
                        token,
                        statements: vec![stmt],
                    })
                }
            }
        }
    }

    fn block_statements(&mut self, closer: TokenKind) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        self.next_token();
        while !self.current_is(closer) && !self.current_is(TokenKind::Eof) {
            self.statement_into(&mut stmts);
            self.next_token();
        }
        stmts
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;
        while !self.peek_is(TokenKind::Semicolon)
            && !self.at_line_end()
            && precedence < precedence_of(self.peek.kind)
        {
            self.next_token();
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self.current.clone();
        let inner = match token.kind {
            TokenKind::Ident => ExprInner::Identifier(token.literal.clone()),
            TokenKind::Int | TokenKind::I32 | TokenKind::I64 => self.parse_integer(&token)?,
            TokenKind::String => ExprInner::String(token.literal.clone()),
            TokenKind::True => ExprInner::Boolean(true),
            TokenKind::False => ExprInner::Boolean(false),
            TokenKind::Bang | TokenKind::Minus => {
                let op = if token.is(TokenKind::Bang) {
                    UnaryOp::Not
                } else {
                    UnaryOp::Negative
                };
                self.next_token();
                let expr = Box::new(self.parse_expression(Precedence::Prefix)?);
                ExprInner::Unary { op, expr }
            }
            TokenKind::LParen => {
                self.next_token();
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::If => ExprInner::If(Box::new(self.parse_if()?)),
            TokenKind::While => ExprInner::While(Box::new(self.parse_while()?)),
            TokenKind::Function => self.parse_function_literal()?,
            TokenKind::Illegal => {
                let message = format!("illegal token: {}", token.literal);
                return Err(self.report(token.pos, message));
            }
            kind => {
                let message = format!("no prefix parse function for {} found", kind);
                return Err(self.report(token.pos, message));
            }
        };
        Ok(Expr { token, inner })
    }

    fn parse_infix(&mut self, left: Expr) -> ParseResult<Expr> {
        let token = self.current.clone();
        let inner = match token.kind {
            TokenKind::LParen => ExprInner::Call {
                callee: Box::new(left),
                arguments: self.parse_call_arguments()?,
            },
            TokenKind::LBracket => {
                self.next_token();
                let index = Box::new(self.parse_expression(Precedence::Lowest)?);
                self.expect_peek(TokenKind::RBracket)?;
                ExprInner::Index {
                    collection: Box::new(left),
                    index,
                }
            }
            kind => {
                let op = match kind_to_binary_op(kind) {
                    Some(op) => op,
                    None => {
                        let message = format!("{} is not a binary operator", kind);
                        return Err(self.report(token.pos, message));
                    }
                };
                self.next_token();
                let right = Box::new(self.parse_expression(precedence_of(kind))?);
                ExprInner::Binary {
                    left: Box::new(left),
                    op,
                    right,
                }
            }
        };
        Ok(Expr { token, inner })
    }

    fn parse_integer(&mut self, token: &Token) -> ParseResult<ExprInner> {
        let literal = token.literal.as_str();
        let parsed = match token.kind {
            TokenKind::I32 => literal
                .strip_suffix("i32")
                .and_then(|digits| digits.parse::<i32>().ok())
                .map(|value| (i64::from(value), IntWidth::I32)),
            TokenKind::I64 => literal
                .strip_suffix("i64")
                .and_then(|digits| digits.parse::<i64>().ok())
                .map(|value| (value, IntWidth::I64)),
            _ => literal.parse::<i64>().ok().map(|value| (value, IntWidth::I64)),
        };
        match parsed {
            Some((value, width)) => Ok(ExprInner::Integer { value, width }),
            None => {
                let message = format!("could not parse {} as integer", literal);
                Err(self.report(token.pos, message))
            }
        }
    }

    fn parse_function_literal(&mut self) -> ParseResult<ExprInner> {
        self.expect_peek(TokenKind::LParen)?;
        let parameters = self.comma_separated_identifiers()?;
        let body = self.parse_block()?;
        Ok(ExprInner::Function { parameters, body })
    }

    // Current token is the '(' and the closing ')' is consumed
    fn comma_separated_identifiers(&mut self) -> ParseResult<Vec<String>> {
        let mut idents = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Ok(idents);
        }
        self.expect_peek(TokenKind::Ident)?;
        idents.push(self.current.literal.clone());
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.expect_peek(TokenKind::Ident)?;
            idents.push(self.current.literal.clone());
        }
        self.expect_peek(TokenKind::RParen)?;
        Ok(idents)
    }

    fn parse_call_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Ok(args);
        }
        self.next_token();
        args.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            args.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.expect_peek(TokenKind::RParen)?;
        Ok(args)
    }
}
