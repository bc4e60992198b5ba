//! Lexer for the source dialect.
//!
//! Produces span-based tokens; text is sliced from the source only when
//! needed. Numeric and character literals additionally carry their decoded
//! value in [`Token::value`] so that the token optimizer can synthesize
//! folded literals that no longer correspond to a source slice.

use logos::Logos;

use crate::diagnostics::{Diagnostic, Span};
use crate::{Error, Result};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Trivia; dropped by [`lex`] before the stream reaches the cursor.
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,
    #[regex(r"//[^\n]*", allow_greedy = true)]
    CommentLine,
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
    CommentBlock,

    #[token("void")]
    KwVoid,
    #[token("int")]
    KwInt,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("do")]
    KwDo,
    #[token("for")]
    KwFor,
    #[token("switch")]
    KwSwitch,
    #[token("case")]
    KwCase,
    #[token("default")]
    KwDefault,
    #[token("break")]
    KwBreak,
    #[token("return")]
    KwReturn,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("print")]
    KwPrint,

    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Id,
    #[regex("[0-9]+")]
    Num,
    #[regex(r"'(\\.|[^\\'])'")]
    Char,
    #[regex(r#""(\\.|[^\\"])*""#)]
    Str,

    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("**")]
    DoubleStar,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,

    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("&=")]
    AmpAssign,
    #[token("|=")]
    PipeAssign,
    #[token("^=")]
    CaretAssign,

    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
}

impl TokenKind {
    /// Token kinds that stand for a compile-time value.
    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Num | TokenKind::Char | TokenKind::True | TokenKind::False
        )
    }

    pub fn is_assign(self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::StarAssign
                | TokenKind::SlashAssign
                | TokenKind::PercentAssign
                | TokenKind::ShlAssign
                | TokenKind::ShrAssign
                | TokenKind::AmpAssign
                | TokenKind::PipeAssign
                | TokenKind::CaretAssign
        )
    }
}

/// One token: kind, byte span, 1-based position, and the decoded value for
/// numeric-like literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: u32,
    pub column: u32,
    pub value: u32,
}

/// Tokenizes source text.
///
/// Any byte sequence the dialect does not know is a syntax error carrying the
/// offending position.
pub fn lex(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let line_starts = line_starts(source);

    while let Some(item) = lexer.next() {
        let span = lexer.span();
        let span = Span::new(span.start as u32, span.end as u32);
        let (line, column) = position_of(&line_starts, span.start);

        let kind = match item {
            Ok(
                TokenKind::Whitespace | TokenKind::CommentLine | TokenKind::CommentBlock,
            ) => continue,
            Ok(kind) => kind,
            Err(()) => {
                return Err(Error::Syntax(Diagnostic::error(
                    format!(
                        "unrecognized character '{}' (line {line}, column {column})",
                        &source[Into::<std::ops::Range<usize>>::into(span)]
                    ),
                    Some(span),
                )));
            }
        };

        let value = match kind {
            TokenKind::Num => parse_number(lexer.slice(), span, line, column)?,
            TokenKind::Char => u32::from(char_value(lexer.slice(), span, line, column)?),
            TokenKind::True => 1,
            TokenKind::False => 0,
            _ => 0,
        };

        tokens.push(Token {
            kind,
            span,
            line,
            column,
            value,
        });
    }

    Ok(tokens)
}

/// Slices the text of a token out of its source.
#[inline]
pub fn token_text<'s>(source: &'s str, token: &Token) -> &'s str {
    &source[Into::<std::ops::Range<usize>>::into(token.span)]
}

fn line_starts(source: &str) -> Vec<u32> {
    std::iter::once(0)
        .chain(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        )
        .collect()
}

fn position_of(line_starts: &[u32], offset: u32) -> (u32, u32) {
    let line = line_starts.partition_point(|&s| s <= offset);
    (line as u32, offset - line_starts[line - 1] + 1)
}

fn parse_number(text: &str, span: Span, line: u32, column: u32) -> Result<u32> {
    text.parse::<u32>().map_err(|_| {
        Error::Syntax(Diagnostic::error(
            format!("number '{text}' is too large (line {line}, column {column})"),
            Some(span),
        ))
    })
}

/// Decodes a character literal (including its quotes) to its byte value.
fn char_value(text: &str, span: Span, line: u32, column: u32) -> Result<u8> {
    let inner = &text[1..text.len() - 1];
    let mut chars = inner.chars();
    let first = chars.next().unwrap_or('\0');
    let decoded = if first == '\\' {
        escape_value(chars.next().unwrap_or('\\'))
    } else if first.is_ascii() {
        Some(first as u8)
    } else {
        None
    };
    decoded.ok_or_else(|| {
        Error::Syntax(Diagnostic::error(
            format!("invalid character literal {text} (line {line}, column {column})"),
            Some(span),
        ))
    })
}

/// Decodes a string literal (including its quotes) to bytes.
pub fn decode_string(token: &Token, source: &str) -> Result<Vec<u8>> {
    let text = token_text(source, token);
    let inner = &text[1..text.len() - 1];
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        let byte = if c == '\\' {
            chars.next().and_then(escape_value)
        } else if c.is_ascii() {
            Some(c as u8)
        } else {
            None
        };
        match byte {
            Some(b) => bytes.push(b),
            None => {
                return Err(Error::Syntax(Diagnostic::error(
                    format!(
                        "invalid escape in string literal (line {}, column {})",
                        token.line, token.column
                    ),
                    Some(token.span),
                )));
            }
        }
    }
    Ok(bytes)
}

fn escape_value(c: char) -> Option<u8> {
    match c {
        'n' => Some(b'\n'),
        't' => Some(b'\t'),
        'r' => Some(b'\r'),
        '0' => Some(b'\0'),
        '\\' => Some(b'\\'),
        '\'' => Some(b'\''),
        '"' => Some(b'"'),
        _ => None,
    }
}
