use crate::optimizer::optimize;
use crate::parser::{lex, TokenKind};

fn fold(source: &str) -> Vec<(TokenKind, u32)> {
    optimize(lex(source).unwrap())
        .into_iter()
        .map(|t| (t.kind, t.value))
        .collect()
}

#[test]
fn folds_simple_constants() {
    assert_eq!(fold("1 + 2"), vec![(TokenKind::Num, 3)]);
    assert_eq!(fold("6 / 2"), vec![(TokenKind::Num, 3)]);
    assert_eq!(fold("7 % 4"), vec![(TokenKind::Num, 3)]);
}

#[test]
fn folds_to_a_fixpoint_with_precedence() {
    // 2 + 3 * 4 must become 14, never 20.
    assert_eq!(
        fold("x = 2 + 3 * 4;"),
        vec![
            (TokenKind::Id, 0),
            (TokenKind::Assign, 0),
            (TokenKind::Num, 14),
            (TokenKind::Semicolon, 0),
        ]
    );
    assert_eq!(fold("1 + 2 + 3"), vec![(TokenKind::Num, 6)]);
}

#[test]
fn left_neighbor_guards_block_unsound_folds() {
    // a - 2 + 3 is (a - 2) + 3, not a - 5.
    assert_eq!(fold("a - 2 + 3").len(), 5);
    // a / 2 * 3 is (a / 2) * 3, not a / 6.
    assert_eq!(fold("a / 2 * 3").len(), 5);
    // -2 + 3 must not become -5.
    assert_eq!(fold("-2 + 3").len(), 4);
}

#[test]
fn right_neighbor_guard_blocks_additive_folds() {
    // 1 + 2 * x is 1 + (2 * x).
    assert_eq!(fold("1 + 2 * x").len(), 5);
}

#[test]
fn multiplicative_folds_under_additive_neighbors_are_fine() {
    // a - 2 * 3 folds the product only.
    assert_eq!(
        fold("a - 2 * 3"),
        vec![(TokenKind::Id, 0), (TokenKind::Minus, 0), (TokenKind::Num, 6)]
    );
}

#[test]
fn subtraction_wraps_like_the_cells_do() {
    assert_eq!(fold("3 - 5"), vec![(TokenKind::Num, 254)]);
}

#[test]
fn division_by_zero_is_left_for_the_compiler() {
    assert_eq!(fold("7 / 0").len(), 3);
}

#[test]
fn division_of_wide_values_is_left_alone() {
    // 300 loads as 44 on the tape; folding 300/2=150 would change meaning.
    assert_eq!(fold("300 / 2").len(), 3);
}

#[test]
fn spans_cover_the_folded_window() {
    let tokens = optimize(lex("x = 10 + 20;").unwrap());
    let folded = tokens.iter().find(|t| t.kind == TokenKind::Num).unwrap();
    assert_eq!(folded.value, 30);
    assert_eq!((folded.span.start, folded.span.end), (4, 11));
}
