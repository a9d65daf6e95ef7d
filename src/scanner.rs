use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::CharIndices;

use log::trace;

use crate::token::{lookup_ident, lookup_literal, Pos, Token, TokenKind};

/// Block discipline of a source text. Chosen once per scanner and shared with the parser
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Syntax {
    /// Blocks are delimited by `{` and `}`; newlines are plain whitespace
    Braces,
    /// Blocks open after `:` with an INDENT and close with a DEDENT
    #[default]
    Indentation,
}

#[derive(Clone)]
pub struct Scanner<'src> {
    code: &'src str,
    code_iter: Peekable<CharIndices<'src>>,
    syntax: Syntax,
    emitted_eof: bool, // Have we yielded the EOF through the iterator yet

    line: usize,
    column: usize,

    at_line_start: bool,
    // Base level 0 is never popped
    indent_stack: Vec<usize>,
    // Synthetic tokens waiting to be handed out, drained before anything else is scanned
    pending: VecDeque<Token>,
}

impl<'src> Scanner<'src> {
    pub fn new(code: &'src str, syntax: Syntax) -> Scanner<'src> {
        Scanner {
            code,
            code_iter: code.char_indices().peekable(),
            syntax,
            emitted_eof: false,
            line: 1,
            column: 1,
            at_line_start: true,
            indent_stack: vec![0],
            pending: VecDeque::new(),
        }
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Produce the next token. Once the source is exhausted this returns EOF forever
    pub fn next_token(&mut self) -> Token {
        let token = self.scan_token();
        trace!("{} {}", token.pos, token);
        token
    }

    fn current_pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    // Byte offset of the next unconsumed character
    fn offset(&mut self) -> usize {
        self.code_iter
            .peek()
            .map(|(offset, _)| *offset)
            .unwrap_or(self.code.len())
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.code_iter.next();
        if let Some((_, ch)) = next {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_char(&mut self) -> Option<char> {
        self.code_iter.peek().map(|(_, ch)| *ch)
    }

    fn peek_second_char(&self) -> Option<char> {
        let mut ahead = self.code_iter.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn consume_next_char_if_eq(&mut self, next_ch: char) -> bool {
        self.consume_next_char_if_match(|ch| ch == next_ch)
    }

    fn consume_next_char_if_match<F>(&mut self, predicate: F) -> bool
    where
        F: FnOnce(char) -> bool,
    {
        match self.peek_char() {
            Some(ch) if predicate(ch) => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace(&mut self) {
        let newline_is_space = self.syntax == Syntax::Braces;
        while self.consume_next_char_if_match(|ch| {
            WS_CHARS.contains(ch) || (newline_is_space && ch == '\n')
        }) {}
    }

    // Consume everything up to and including the next newline
    fn skip_line(&mut self) {
        while let Some((_, ch)) = self.advance() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn indent_level(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    fn scan_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return token;
            }
            if self.syntax == Syntax::Indentation && self.at_line_start {
                self.at_line_start = false;
                self.scan_indentation();
                continue;
            }

            self.skip_whitespace();
            let pos = self.current_pos();
            let (offset, ch) = match self.advance() {
                Some(next) => next,
                None => return self.finish(pos),
            };
            match ch {
                // Only reachable in indentation mode, braces mode eats newlines as whitespace
                '\n' => self.at_line_start = true,
                '/' if self.peek_char() == Some('/') => {
                    // Leave the newline in place so line start handling still sees it
                    while self.consume_next_char_if_match(|ch| ch != '\n') {}
                }
                '=' | '!' => {
                    let literal = if self.consume_next_char_if_eq('=') {
                        format!("{}=", ch)
                    } else {
                        ch.to_string()
                    };
                    return self.symbol(literal, pos);
                }
                '"' => return self.scan_string(pos),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    return self.scan_identifier(offset, pos)
                }
                c if c.is_ascii_digit() => return self.scan_number(offset, pos),
                c => return self.symbol(c.to_string(), pos),
            }
        }
    }

    /// Measure the leading whitespace of a logical line and queue INDENT/DEDENT tokens.
    /// Blank and comment-only lines are skipped without touching the stack
    fn scan_indentation(&mut self) {
        let mut width = 0;
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') => {
                    self.advance();
                    width += 1;
                }
                Some('\r') | Some('\n') => {
                    self.skip_line();
                    width = 0;
                }
                Some('/') if self.peek_second_char() == Some('/') => {
                    self.skip_line();
                    width = 0;
                }
                // EOF unwinds whatever is left on the stack in finish
                None => return,
                Some(_) => break,
            }
        }

        let pos = self.current_pos();
        if width > self.indent_level() {
            self.indent_stack.push(width);
            self.pending.push_back(Token::new(TokenKind::Indent, "", pos));
        } else if width < self.indent_level() {
            while self.indent_stack.len() > 1 && self.indent_level() > width {
                self.indent_stack.pop();
                self.pending.push_back(Token::new(TokenKind::Dedent, "", pos));
            }
            if self.indent_level() != width {
                self.pending.push_back(Token::new(
                    TokenKind::Illegal,
                    "unindent does not match any outer indentation level",
                    pos,
                ));
                // Resynchronise on the new level so the rest of the line scans normally
                self.indent_stack.push(width);
            }
        }
    }

    // Close every open indentation level before the EOF
    fn finish(&mut self, pos: Pos) -> Token {
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.pending.push_back(Token::new(TokenKind::Dedent, "", pos));
        }
        self.pending
            .pop_front()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, "", pos))
    }

    fn symbol(&self, literal: String, pos: Pos) -> Token {
        let kind = lookup_literal(&literal).unwrap_or(TokenKind::Illegal);
        Token::new(kind, literal, pos)
    }

    fn scan_string(&mut self, pos: Pos) -> Token {
        let mut string = String::new();
        while let Some((_, ch)) = self.advance() {
            match ch {
                '"' => return Token::new(TokenKind::String, string, pos),
                '\\' => match self.advance() {
                    Some((_, 'n')) => string.push('\n'),
                    Some((_, 't')) => string.push('\t'),
                    Some((_, '\\')) => string.push('\\'),
                    Some((_, '"')) => string.push('"'),
                    Some((_, other)) => {
                        string.push('\\');
                        string.push(other);
                    }
                    None => break,
                },
                _ => string.push(ch),
            }
        }
        Token::new(TokenKind::Illegal, "unterminated string", pos)
    }

    fn scan_identifier(&mut self, offset: usize, pos: Pos) -> Token {
        while self.consume_next_char_if_match(|ch| ch.is_ascii_alphanumeric() || ch == '_') {}
        let end = self.offset();
        let identifier = &self.code[offset..end];
        Token::new(lookup_ident(identifier), identifier, pos)
    }

    fn scan_number(&mut self, offset: usize, pos: Pos) -> Token {
        while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {}
        let digits_end = self.offset();
        if !self.peek_char().map_or(false, |ch| ch.is_ascii_alphabetic()) {
            return Token::new(TokenKind::Int, &self.code[offset..digits_end], pos);
        }

        while self.consume_next_char_if_match(|ch| ch.is_ascii_alphanumeric() || ch == '_') {}
        let end = self.offset();
        let kind = match &self.code[digits_end..end] {
            "i32" => TokenKind::I32,
            "i64" => TokenKind::I64,
            _ => TokenKind::Illegal,
        };
        Token::new(kind, &self.code[offset..end], pos)
    }
}

const WS_CHARS: &str = " \r\t";

impl<'src> Iterator for Scanner<'src> {
    type Item = Token;

    /// Yields every token up to and including the first EOF
    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted_eof {
            return None;
        }
        let token = self.next_token();
        if token.is(TokenKind::Eof) {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use TokenKind::*;

    fn kinds(code: &str, syntax: Syntax) -> Vec<TokenKind> {
        Scanner::new(code, syntax).map(|token| token.kind).collect()
    }

    #[test]
    fn scan_print_and_typed_assignment() {
        let code = "print \"Hello World\"; x = 42i32;";
        let tokens: Vec<(TokenKind, std::string::String)> = Scanner::new(code, Syntax::Braces)
            .map(|token| (token.kind, token.literal))
            .collect();
        let expected = vec![
            (Print, "print"),
            (String, "Hello World"),
            (Semicolon, ";"),
            (Ident, "x"),
            (Assign, "="),
            (I32, "42i32"),
            (Semicolon, ";"),
            (Eof, ""),
        ];
        let expected: Vec<(TokenKind, std::string::String)> = expected
            .into_iter()
            .map(|(kind, lit)| (kind, lit.to_string()))
            .collect();
        assert_eq!(expected, tokens);
    }

    #[test]
    fn scan_brace_sequence() {
        let code = "print \"Hello World\";\nx = 42i32;\nif x == 42 { print \"yes\"; } else { print \"no\"; }";
        assert_eq!(
            vec![
                Print, String, Semicolon, Ident, Assign, I32, Semicolon, If, Ident, Eq, Int,
                LBrace, Print, String, Semicolon, RBrace, Else, LBrace, Print, String, Semicolon,
                RBrace, Eof
            ],
            kinds(code, Syntax::Braces)
        );
    }

    #[test]
    fn scan_operators() {
        assert_eq!(
            vec![
                Bang, NotEq, Assign, Eq, Lt, Gt, Plus, Minus, Asterisk, Slash, Percent, Comma,
                Colon, LParen, RParen, LBracket, RBracket, Eof
            ],
            kinds("! != = == < > + - * / % , : ( ) [ ]", Syntax::Braces)
        );
    }

    #[test]
    fn scan_positions() {
        let mut scanner = Scanner::new("x = 1\n  y", Syntax::Braces);
        assert_eq!(Pos { line: 1, column: 1 }, scanner.next_token().pos);
        assert_eq!(Pos { line: 1, column: 3 }, scanner.next_token().pos);
        assert_eq!(Pos { line: 1, column: 5 }, scanner.next_token().pos);
        assert_eq!(Pos { line: 2, column: 3 }, scanner.next_token().pos);
    }

    #[test]
    fn nested_indentation() {
        let code = "if x:\n    y = 1\n    if y:\n        print y\nz = 2";
        assert_eq!(
            vec![
                If, Ident, Colon, Indent, Ident, Assign, Int, If, Ident, Colon, Indent, Print,
                Ident, Dedent, Dedent, Ident, Assign, Int, Eof
            ],
            kinds(code, Syntax::Indentation)
        );
    }

    #[test]
    fn eof_closes_open_blocks() {
        let code = "while x:\n    if y:\n        print x\n";
        assert_eq!(
            vec![
                While, Ident, Colon, Indent, If, Ident, Colon, Indent, Print, Ident, Dedent,
                Dedent, Eof
            ],
            kinds(code, Syntax::Indentation)
        );
    }

    #[test]
    fn blank_and_comment_lines_keep_indentation() {
        let code = "if x:\n    a\n\n      \n// note\n    b // trailing\nc";
        assert_eq!(
            vec![If, Ident, Colon, Indent, Ident, Ident, Dedent, Ident, Eof],
            kinds(code, Syntax::Indentation)
        );
    }

    #[test]
    fn inconsistent_dedent_is_illegal() {
        let code = "if x:\n    a\n  b\n";
        let tokens: Vec<Token> = Scanner::new(code, Syntax::Indentation).collect();
        let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            vec![If, Ident, Colon, Indent, Ident, Dedent, Illegal, Ident, Dedent, Eof],
            kinds
        );
        assert_eq!(
            "unindent does not match any outer indentation level",
            tokens[6].literal
        );
    }

    #[test]
    fn newlines_are_whitespace_with_braces() {
        assert_eq!(
            vec![If, Ident, LBrace, Ident, RBrace, Eof],
            kinds("if x {\n    a\n}\n", Syntax::Braces)
        );
    }

    #[test]
    fn string_escapes() {
        let mut scanner = Scanner::new(r#""a\tb\n\\ \"q\"""#, Syntax::Braces);
        let token = scanner.next_token();
        assert_eq!(String, token.kind);
        assert_eq!("a\tb\n\\ \"q\"", token.literal);
    }

    #[test]
    fn unterminated_string_is_illegal() {
        let mut scanner = Scanner::new("\"a string that isn't terminated", Syntax::Braces);
        let token = scanner.next_token();
        assert_eq!(Illegal, token.kind);
        assert_eq!(Eof, scanner.next_token().kind);
    }

    #[test]
    fn integer_suffixes() {
        let tokens: Vec<Token> = Scanner::new("7 8i64 9i32 10i16", Syntax::Braces).collect();
        assert_eq!(Int, tokens[0].kind);
        assert_eq!(I64, tokens[1].kind);
        assert_eq!("8i64", tokens[1].literal);
        assert_eq!(I32, tokens[2].kind);
        assert_eq!(Illegal, tokens[3].kind);
        assert_eq!("10i16", tokens[3].literal);
    }

    #[test]
    fn identifiers_and_keywords() {
        let tokens: Vec<Token> = Scanner::new("_tmp fn x1 while", Syntax::Braces).collect();
        assert_eq!((Ident, "_tmp"), (tokens[0].kind, tokens[0].literal.as_str()));
        assert_eq!(Function, tokens[1].kind);
        assert_eq!((Ident, "x1"), (tokens[2].kind, tokens[2].literal.as_str()));
        assert_eq!(While, tokens[3].kind);
    }

    #[test]
    fn unknown_character_is_illegal() {
        let mut scanner = Scanner::new("$var", Syntax::Braces);
        let token = scanner.next_token();
        assert_eq!((Illegal, "$"), (token.kind, token.literal.as_str()));
        assert_eq!(Ident, scanner.next_token().kind);
    }

    #[test]
    fn eof_repeats_forever() {
        let mut scanner = Scanner::new("", Syntax::Indentation);
        assert_eq!(Eof, scanner.next_token().kind);
        assert_eq!(Eof, scanner.next_token().kind);
        // The iterator stops after a single EOF
        let mut scanner = Scanner::new("", Syntax::Indentation);
        assert_eq!(Some(Eof), scanner.next().map(|token| token.kind));
        assert!(scanner.next().is_none());
    }
}
