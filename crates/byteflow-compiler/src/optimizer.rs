//! Token-stream peephole optimizer.
//!
//! Folds `NUM op NUM` windows to a fixpoint, guarded so precedence can never
//! change meaning: a multiplicative fold is skipped when the token before
//! the window is itself multiplicative (`a / 2 * 3`), an additive fold when
//! the neighbor on either side binds tighter (`a - 2 + 3`, `1 + 2 * x`).
//! Folded values match what the emitted code would compute on 8-bit cells:
//! add/sub/mul commute with the mod-256 load, division does not, so `/` and
//! `%` only fold when both operands already fit a cell.

use crate::parser::{Token, TokenKind};

/// Rewrites the stream in place until no fold applies. Meaning-preserving;
/// with the optimize flag off the caller skips this entirely.
pub fn optimize(mut tokens: Vec<Token>) -> Vec<Token> {
    while let Some((i, value)) = find_fold(&tokens) {
        let folded = Token {
            kind: TokenKind::Num,
            span: tokens[i].span.cover(tokens[i + 2].span),
            line: tokens[i].line,
            column: tokens[i].column,
            value,
        };
        tokens.splice(i..i + 3, std::iter::once(folded));
    }
    tokens
}

const MUL_CLASS: [TokenKind; 3] = [TokenKind::Star, TokenKind::Slash, TokenKind::Percent];
const ADD_CLASS: [TokenKind; 5] = [
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Star,
    TokenKind::Slash,
    TokenKind::Percent,
];

fn find_fold(tokens: &[Token]) -> Option<(usize, u32)> {
    for i in 0..tokens.len().saturating_sub(2) {
        if tokens[i].kind != TokenKind::Num || tokens[i + 2].kind != TokenKind::Num {
            continue;
        }
        let op = tokens[i + 1].kind;
        let before = i.checked_sub(1).map(|j| tokens[j].kind);
        let after = tokens.get(i + 3).map(|t| t.kind);
        let (a, b) = (tokens[i].value, tokens[i + 2].value);

        let value = match op {
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
                if before.is_some_and(|k| MUL_CLASS.contains(&k)) {
                    continue;
                }
                match op {
                    TokenKind::Star => match u64::from(a).checked_mul(u64::from(b)) {
                        Some(v) if v <= u64::from(u32::MAX) => v as u32,
                        _ => continue,
                    },
                    // Division folds on cell-width values only.
                    _ if a > 255 || b > 255 || b == 0 => continue,
                    TokenKind::Slash => a / b,
                    _ => a % b,
                }
            }
            TokenKind::Plus | TokenKind::Minus => {
                if before.is_some_and(|k| ADD_CLASS.contains(&k))
                    || after.is_some_and(|k| MUL_CLASS.contains(&k))
                {
                    continue;
                }
                if op == TokenKind::Plus {
                    match a.checked_add(b) {
                        Some(v) => v,
                        None => continue,
                    }
                } else if a >= b {
                    a - b
                } else {
                    // Wraps exactly like the emitted subtraction would.
                    u32::from(((a % 256) as u8).wrapping_sub((b % 256) as u8))
                }
            }
            _ => continue,
        };
        return Some((i, value));
    }
    None
}
