//! Token-level front end: lexer and positional cursor.

mod cursor;
mod lexer;

#[cfg(test)]
mod cursor_tests;
#[cfg(test)]
mod lexer_tests;

use std::sync::Arc;

use crate::Result;

pub use cursor::{Cursor, kind_name};
pub use lexer::{Token, TokenKind, decode_string, lex, token_text};

/// Immutable source + token pair, shared by every cursor over the program.
///
/// Function definitions retain ranges into this buffer instead of cloning
/// their tokens; each call site then compiles the callee through a fresh
/// [`Cursor`] over the same buffer.
#[derive(Debug)]
pub struct TokenBuffer {
    pub source: String,
    pub tokens: Vec<Token>,
}

impl TokenBuffer {
    pub fn lex(source: impl Into<String>) -> Result<Arc<Self>> {
        let source = source.into();
        let tokens = lex(&source)?;
        Ok(Arc::new(Self { source, tokens }))
    }

    /// Builds a buffer from an already-processed token stream (used after
    /// the token optimizer rewrites the stream).
    pub fn with_tokens(source: String, tokens: Vec<Token>) -> Arc<Self> {
        Arc::new(Self { source, tokens })
    }

    pub fn text(&self, token: &Token) -> &str {
        token_text(&self.source, token)
    }
}
