//! Byteflow compiler: a C-like dialect in, an eight-instruction
//! tape-machine program out.
//!
//! - `parser` - lexer and token cursor
//! - `scope` - symbol environment over the cell tape
//! - `codegen` - expression lowering and the statement compiler
//! - `functions` / `library` - function table and injected library
//! - `optimizer` - token-stream constant folding
//! - `diagnostics` - error payloads and warnings
//!
//! The target machine has no registers, no addressable memory and no call
//! instruction; everything is emulated on a flat cell tape under one
//! invariant: after every compiled statement the data pointer rests where it
//! started, and every expression leaves its value one cell behind an
//! advanced pointer.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod codegen;
pub mod diagnostics;
pub mod functions;
pub mod library;
pub mod optimizer;
pub mod parser;
pub mod scope;

mod compiler;

#[cfg(test)]
mod optimizer_tests;
#[cfg(test)]
mod scope_tests;

pub use compiler::{compile, Compiler, Output};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, Span};

/// Errors that abort a compilation. Both kinds are fatal: nothing is
/// emitted on failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The token stream did not match an expected shape.
    #[error("syntax error: {0}")]
    Syntax(Diagnostic),

    /// Grammatical but meaning-invalid input.
    #[error("semantic error: {0}")]
    Semantic(Diagnostic),
}

impl Error {
    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            Error::Syntax(d) | Error::Semantic(d) => d,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
