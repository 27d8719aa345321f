// ABOUTME: Error types and the diagnostics collector shared by lex/parse/resolve/eval

use crate::token::{Token, TokenKind};
use thiserror::Error;

/// A single lex/parse/resolve diagnostic, with enough context to render the
/// "[line L] Error<where>: <message>" format from the external interface.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub line: usize,
    pub location: ErrorLocation,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ErrorLocation {
    /// A lex error: no token was identified, so there is no "where" clause.
    None,
    /// A parse/resolve error at a specific token.
    Token(String),
    /// A parse error at end of input.
    End,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let where_ = match &self.location {
            ErrorLocation::None => String::new(),
            ErrorLocation::End => " at end".to_string(),
            ErrorLocation::Token(lexeme) => format!(" at '{lexeme}'"),
        };
        write!(f, "[line {}] Error{}: {}", self.line, where_, self.message)
    }
}

/// Accumulating collector for compile-phase diagnostics. Threaded explicitly
/// through the lexer, parser, and resolver rather than kept as process-wide
/// mutable state, so the run-once and REPL drivers control its lifetime.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Report an error with no specific token (used by the lexer).
    pub fn error_at_line(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(CompileError {
            line,
            location: ErrorLocation::None,
            message: message.into(),
        });
    }

    /// Report an error at a specific token (used by the parser and resolver).
    pub fn error_at_token(&mut self, token: &Token, message: impl Into<String>) {
        let location = if token.kind == TokenKind::Eof {
            ErrorLocation::End
        } else {
            ErrorLocation::Token(token.lexeme.clone())
        };
        self.errors.push(CompileError {
            line: token.line,
            location,
            message: message.into(),
        });
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Print every accumulated diagnostic to stderr, in the order reported.
    pub fn report_all(&self) {
        for err in &self.errors {
            eprintln!("{err}");
        }
    }
}

/// A runtime error carries the line at which it occurred so the driver can
/// render "<message>\n[line L]" per the external interface.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        RuntimeError {
            message: message.into(),
            line,
        }
    }

    pub fn undefined_variable(name: &str, line: usize) -> Self {
        RuntimeError::new(format!("Undefined variable '{name}'."), line)
    }

    pub fn report(&self) {
        eprintln!("{}\n[line {}]", self.message, self.line);
    }
}
