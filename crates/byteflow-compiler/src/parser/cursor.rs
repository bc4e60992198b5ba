//! Positional cursor over a token slice.
//!
//! Every component of the compiler walks tokens through this facade: simple
//! lookahead, shape assertions that raise syntax errors quoting the offending
//! token, and matching-delimiter search. A cursor is a cheap value — it holds
//! an `Arc` to the shared buffer plus three indices — so each function call
//! site can compile the callee body with a fresh, independent cursor.

use std::sync::Arc;

use crate::diagnostics::Diagnostic;
use crate::parser::lexer::{Token, TokenKind, token_text};
use crate::parser::TokenBuffer;
use crate::{Error, Result};

#[derive(Clone)]
pub struct Cursor {
    buf: Arc<TokenBuffer>,
    start: usize,
    end: usize,
    pos: usize,
}

impl Cursor {
    /// Cursor over a sub-range of the buffer's tokens.
    pub fn new(buf: Arc<TokenBuffer>, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= buf.tokens.len());
        Self {
            buf,
            start,
            end,
            pos: start,
        }
    }

    /// Cursor over the whole buffer.
    pub fn whole(buf: Arc<TokenBuffer>) -> Self {
        let end = buf.tokens.len();
        Self::new(buf, 0, end)
    }

    pub fn buffer(&self) -> &Arc<TokenBuffer> {
        &self.buf
    }

    /// Current position, relative to the slice start.
    pub fn pos(&self) -> usize {
        self.pos - self.start
    }

    /// Number of tokens in the slice.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    pub fn current(&self) -> Option<&Token> {
        self.peek(0)
    }

    /// Token `n` positions ahead of the current one.
    pub fn peek(&self, n: usize) -> Option<&Token> {
        let idx = self.pos + n;
        (idx < self.end).then(|| &self.buf.tokens[idx])
    }

    /// Token at a slice-relative index, independent of the cursor position.
    pub fn token_at(&self, index: usize) -> Option<&Token> {
        let idx = self.start + index;
        (idx < self.end).then(|| &self.buf.tokens[idx])
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.end);
    }

    /// Moves the cursor to a slice-relative index.
    pub fn jump_to(&mut self, index: usize) {
        self.pos = (self.start + index).min(self.end);
    }

    pub fn text(&self, token: &Token) -> &str {
        token_text(&self.buf.source, token)
    }

    /// Renders a token the way error messages quote it.
    pub fn describe(&self, token: &Token) -> String {
        format!(
            "'{}' (line {}, column {})",
            self.text(token),
            token.line,
            token.column
        )
    }

    pub fn syntax_error(&self, message: impl Into<String>, token: Option<&Token>) -> Error {
        Error::Syntax(Diagnostic::error(message, token.map(|t| t.span)))
    }

    pub fn semantic_error(&self, message: impl Into<String>, token: Option<&Token>) -> Error {
        Error::Semantic(Diagnostic::error(message, token.map(|t| t.span)))
    }

    /// Syntax error at the current token (or at end of input).
    pub fn unexpected(&self, expected: &str) -> Error {
        match self.current() {
            Some(token) => self.syntax_error(
                format!("expected {expected} instead of {}", self.describe(token)),
                Some(token),
            ),
            None => self.syntax_error(format!("expected {expected}, reached end of code"), None),
        }
    }

    /// Asserts the token `offset` positions ahead has the given kind.
    pub fn expect_at(&self, offset: usize, kind: TokenKind) -> Result<&Token> {
        match self.peek(offset) {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(self.syntax_error(
                format!(
                    "expected {} instead of {}",
                    kind_name(kind),
                    self.describe(token)
                ),
                Some(token),
            )),
            None => Err(self.syntax_error(
                format!("expected {}, reached end of code", kind_name(kind)),
                None,
            )),
        }
    }

    pub fn expect_current(&self, kind: TokenKind) -> Result<&Token> {
        self.expect_at(0, kind)
    }

    /// Asserts a run of consecutive kinds starting `offset` tokens ahead.
    pub fn expect_seq(&self, offset: usize, kinds: &[TokenKind]) -> Result<()> {
        for (i, &kind) in kinds.iter().enumerate() {
            self.expect_at(offset + i, kind)?;
        }
        Ok(())
    }

    /// Index of the delimiter matching the opener at a slice-relative index.
    ///
    /// The opener must be `(`, `[` or `{`; nesting of the same delimiter kind
    /// is respected.
    pub fn find_matching(&self, open: usize) -> Result<usize> {
        let open_token = self
            .token_at(open)
            .ok_or_else(|| self.syntax_error("expected a delimiter, reached end of code", None))?;
        let close = match open_token.kind {
            TokenKind::LParen => TokenKind::RParen,
            TokenKind::LBrack => TokenKind::RBrack,
            TokenKind::LBrace => TokenKind::RBrace,
            _ => {
                return Err(self.syntax_error(
                    format!("expected a delimiter at {}", self.describe(open_token)),
                    Some(open_token),
                ));
            }
        };

        let mut depth = 0usize;
        let mut index = open;
        while let Some(token) = self.token_at(index) {
            if token.kind == open_token.kind {
                depth += 1;
            } else if token.kind == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(index);
                }
            }
            index += 1;
        }

        Err(self.syntax_error(
            format!("unmatched {}", self.describe(open_token)),
            Some(open_token),
        ))
    }
}

/// Human name of a token kind, used in "expected ..." messages.
pub fn kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Whitespace => "whitespace",
        TokenKind::CommentLine | TokenKind::CommentBlock => "a comment",
        TokenKind::KwVoid => "'void'",
        TokenKind::KwInt => "'int'",
        TokenKind::KwIf => "'if'",
        TokenKind::KwElse => "'else'",
        TokenKind::KwWhile => "'while'",
        TokenKind::KwDo => "'do'",
        TokenKind::KwFor => "'for'",
        TokenKind::KwSwitch => "'switch'",
        TokenKind::KwCase => "'case'",
        TokenKind::KwDefault => "'default'",
        TokenKind::KwBreak => "'break'",
        TokenKind::KwReturn => "'return'",
        TokenKind::True => "'true'",
        TokenKind::False => "'false'",
        TokenKind::KwPrint => "'print'",
        TokenKind::Id => "identifier",
        TokenKind::Num => "number",
        TokenKind::Char => "character literal",
        TokenKind::Str => "string literal",
        TokenKind::Inc => "'++'",
        TokenKind::Dec => "'--'",
        TokenKind::DoubleStar => "'**'",
        TokenKind::Plus => "'+'",
        TokenKind::Minus => "'-'",
        TokenKind::Star => "'*'",
        TokenKind::Slash => "'/'",
        TokenKind::Percent => "'%'",
        TokenKind::Shl => "'<<'",
        TokenKind::Shr => "'>>'",
        TokenKind::EqEq => "'=='",
        TokenKind::Ne => "'!='",
        TokenKind::Le => "'<='",
        TokenKind::Ge => "'>='",
        TokenKind::Lt => "'<'",
        TokenKind::Gt => "'>'",
        TokenKind::AndAnd => "'&&'",
        TokenKind::OrOr => "'||'",
        TokenKind::Bang => "'!'",
        TokenKind::Amp => "'&'",
        TokenKind::Pipe => "'|'",
        TokenKind::Caret => "'^'",
        TokenKind::Tilde => "'~'",
        TokenKind::Assign => "'='",
        TokenKind::PlusAssign => "'+='",
        TokenKind::MinusAssign => "'-='",
        TokenKind::StarAssign => "'*='",
        TokenKind::SlashAssign => "'/='",
        TokenKind::PercentAssign => "'%='",
        TokenKind::ShlAssign => "'<<='",
        TokenKind::ShrAssign => "'>>='",
        TokenKind::AmpAssign => "'&='",
        TokenKind::PipeAssign => "'|='",
        TokenKind::CaretAssign => "'^='",
        TokenKind::Question => "'?'",
        TokenKind::Colon => "':'",
        TokenKind::Semicolon => "';'",
        TokenKind::Comma => "','",
        TokenKind::LParen => "'('",
        TokenKind::RParen => "')'",
        TokenKind::LBrace => "'{'",
        TokenKind::RBrace => "'}'",
        TokenKind::LBrack => "'['",
        TokenKind::RBrack => "']'",
    }
}
