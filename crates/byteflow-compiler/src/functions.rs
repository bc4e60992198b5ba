//! Function table and definition parsing.
//!
//! Definitions are registered up front with their bodies retained as ranges
//! into the shared token buffer; nothing is emitted until a call site (or
//! the driver, for `main`) instantiates the definition. Library primitives
//! carry a native instruction body instead of tokens.

use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::diagnostics::Diagnostic;
use crate::parser::{Cursor, Token, TokenBuffer, TokenKind};
use crate::scope::{VarDecl, VarKind};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    Int,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Body tokens, spanning the `{` .. `}` of the definition.
    Tokens {
        buffer: Arc<TokenBuffer>,
        range: Range<usize>,
    },
    /// Raw instructions emitted at the return-value cell; must be
    /// pointer-neutral and respect the calling convention.
    Native(&'static str),
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub returns: ReturnKind,
    pub params: Vec<VarDecl>,
    pub body: FunctionBody,
}

impl FunctionDef {
    /// Parses one definition with the cursor at its return-type token and
    /// leaves the cursor just past the closing brace.
    pub fn parse(cursor: &mut Cursor) -> Result<Self> {
        let ret_tok = cursor
            .current()
            .ok_or_else(|| cursor.unexpected("a function definition"))?;
        let returns = match ret_tok.kind {
            TokenKind::KwVoid => ReturnKind::Void,
            TokenKind::KwInt => ReturnKind::Int,
            _ => {
                return Err(cursor.semantic_error(
                    format!(
                        "function return type can be either void or int, not {}",
                        cursor.describe(ret_tok)
                    ),
                    Some(ret_tok),
                ));
            }
        };

        cursor.expect_seq(1, &[TokenKind::Id, TokenKind::LParen])?;
        let name = cursor.text(cursor.peek(1).expect("checked")).to_string();

        let lparen = cursor.pos() + 2;
        let rparen = cursor.find_matching(lparen)?;
        let brace = match cursor.token_at(rparen + 1) {
            Some(tok) if tok.kind == TokenKind::LBrace => rparen + 1,
            Some(tok) => {
                return Err(cursor.syntax_error(
                    format!("expected '{{' instead of {}", cursor.describe(tok)),
                    Some(tok),
                ));
            }
            None => return Err(cursor.syntax_error("expected '{', reached end of code", None)),
        };
        let rbrace = cursor.find_matching(brace)?;

        let params = parse_parameter_list(cursor, lparen, rparen)?;
        let body = FunctionBody::Tokens {
            buffer: cursor.buffer().clone(),
            range: brace..rbrace + 1,
        };
        cursor.jump_to(rbrace + 1);

        Ok(Self {
            name,
            returns,
            params,
            body,
        })
    }
}

/// Parameter declarations between `(` and `)`:
/// `int ID ([ NUM ])*`, comma-separated.
fn parse_parameter_list(cursor: &Cursor, lparen: usize, rparen: usize) -> Result<Vec<VarDecl>> {
    let mut params = Vec::new();
    let mut i = lparen + 1;
    while i < rparen {
        let tok = cursor.token_at(i).expect("inside delimiters");
        if tok.kind != TokenKind::KwInt {
            return Err(cursor.semantic_error(
                format!(
                    "only int is supported as a function parameter, not {}",
                    cursor.describe(tok)
                ),
                Some(tok),
            ));
        }
        let (decl, _, next) = parse_var_decl(cursor, i)?;
        params.push(decl);
        i = next;
        match cursor.token_at(i).map(|t| t.kind) {
            Some(TokenKind::Comma) => i += 1,
            _ if i == rparen => {}
            _ => {
                let tok = cursor.token_at(i).expect("inside delimiters");
                return Err(cursor.syntax_error(
                    format!(
                        "expected ',' or ')' instead of {} in parameter list",
                        cursor.describe(tok)
                    ),
                    Some(tok),
                ));
            }
        }
    }
    Ok(params)
}

/// Parses `int ID ([ NUM ])*` at a slice-relative index, without moving the
/// cursor. Returns the declaration, the identifier token, and the index just
/// past the declaration tokens.
pub(crate) fn parse_var_decl(cursor: &Cursor, at: usize) -> Result<(VarDecl, Token, usize)> {
    debug_assert_eq!(cursor.token_at(at).map(|t| t.kind), Some(TokenKind::KwInt));
    let id = match cursor.token_at(at + 1) {
        Some(tok) if tok.kind == TokenKind::Id => *tok,
        Some(tok) => {
            return Err(cursor.syntax_error(
                format!("expected identifier instead of {}", cursor.describe(tok)),
                Some(tok),
            ));
        }
        None => return Err(cursor.syntax_error("expected identifier, reached end of code", None)),
    };

    let mut dims = Vec::new();
    let mut i = at + 2;
    while cursor.token_at(i).map(|t| t.kind) == Some(TokenKind::LBrack) {
        let num = match cursor.token_at(i + 1) {
            Some(tok) if tok.kind == TokenKind::Num => *tok,
            Some(tok) => {
                return Err(cursor.syntax_error(
                    format!(
                        "expected a number as array dimension instead of {}",
                        cursor.describe(tok)
                    ),
                    Some(tok),
                ));
            }
            None => {
                return Err(
                    cursor.syntax_error("expected an array dimension, reached end of code", None)
                );
            }
        };
        match cursor.token_at(i + 2) {
            Some(tok) if tok.kind == TokenKind::RBrack => {}
            Some(tok) => {
                return Err(cursor.syntax_error(
                    format!("expected ']' instead of {}", cursor.describe(tok)),
                    Some(tok),
                ));
            }
            None => return Err(cursor.syntax_error("expected ']', reached end of code", None)),
        }
        if num.value == 0 {
            return Err(cursor.semantic_error(
                format!(
                    "array dimension must be positive at {}",
                    cursor.describe(&num)
                ),
                Some(&num),
            ));
        }
        dims.push(num.value);
        i += 3;
    }

    let name = cursor.text(&id).to_string();
    let decl = if dims.is_empty() {
        VarDecl::scalar(name)
    } else {
        VarDecl {
            name,
            kind: VarKind::Array,
            dimensions: dims,
        }
    };
    Ok((decl, id, i))
}

/// Name → definition map; insertion order is the registration order.
#[derive(Debug, Default)]
pub struct FunctionTable {
    map: IndexMap<String, FunctionDef>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, def: FunctionDef) -> Result<()> {
        if self.map.contains_key(&def.name) {
            return Err(Error::Semantic(Diagnostic::error(
                format!("function '{}' is already defined", def.name),
                None,
            )));
        }
        self.map.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
