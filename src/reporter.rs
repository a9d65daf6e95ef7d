use std::io::Write;

use crate::interpreter::RuntimeError;
use crate::parser::ParseError;

/// Sink for the diagnostics a driver surfaces to the user
pub trait Reporter {
    fn parse_error(&mut self, error: &ParseError);
    fn runtime_error(&mut self, error: &RuntimeError);

    fn parse_errors(&mut self, errors: &[ParseError]) {
        for error in errors {
            self.parse_error(error);
        }
    }
}

// A reporter that renders error messages to the output
pub struct WriteReporter<W> {
    writer: W,
}

impl<W> WriteReporter<W> {
    pub fn new(writer: W) -> WriteReporter<W> {
        WriteReporter { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Reporter for WriteReporter<W>
where
    W: Write,
{
    fn parse_error(&mut self, error: &ParseError) {
        // If the write fails, we don't care
        _ = writeln!(self.writer, "Parser error: {}", error);
    }

    fn runtime_error(&mut self, error: &RuntimeError) {
        _ = writeln!(self.writer, "ERROR: {}", error);
    }
}
