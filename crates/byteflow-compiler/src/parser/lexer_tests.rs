use super::lexer::{decode_string, lex, token_text, TokenKind};
use crate::Error;

fn kinds(source: &str) -> Vec<TokenKind> {
    lex(source).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn keywords_are_not_identifiers() {
    assert_eq!(
        kinds("int x while whilex"),
        vec![
            TokenKind::KwInt,
            TokenKind::Id,
            TokenKind::KwWhile,
            TokenKind::Id,
        ]
    );
}

#[test]
fn operators_lex_by_maximal_munch() {
    assert_eq!(
        kinds("<<= << < == = ++ + ** *"),
        vec![
            TokenKind::ShlAssign,
            TokenKind::Shl,
            TokenKind::Lt,
            TokenKind::EqEq,
            TokenKind::Assign,
            TokenKind::Inc,
            TokenKind::Plus,
            TokenKind::DoubleStar,
            TokenKind::Star,
        ]
    );
}

#[test]
fn tokens_carry_positions() {
    let tokens = lex("int x;\n  x = 2;").unwrap();
    let x = &tokens[3]; // the x on the second line
    assert_eq!(x.kind, TokenKind::Id);
    assert_eq!((x.line, x.column), (2, 3));
}

#[test]
fn token_text_slices_the_source() {
    let source = "int counter;";
    let tokens = lex(source).unwrap();
    assert_eq!(token_text(source, &tokens[1]), "counter");
}

#[test]
fn numbers_and_chars_carry_their_value() {
    let tokens = lex("42 'A' '\\n' true false").unwrap();
    let values: Vec<u32> = tokens.iter().map(|t| t.value).collect();
    assert_eq!(values, vec![42, 65, 10, 1, 0]);
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds("1 // line\n2 /* block\n spans */ 3 /* star edge **/ 4"),
        vec![TokenKind::Num; 4]
    );
}

#[test]
fn string_escapes_decode() {
    let source = r#""a\n\t\\\"\0b""#;
    let tokens = lex(source).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Str);
    assert_eq!(
        decode_string(&tokens[0], source).unwrap(),
        vec![b'a', b'\n', b'\t', b'\\', b'"', 0, b'b']
    );
}

#[test]
fn unknown_character_is_a_syntax_error() {
    let err = lex("int @ x;").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    assert!(err.to_string().contains("'@'"));
}

#[test]
fn oversized_number_is_a_syntax_error() {
    let err = lex("99999999999999999999").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
}
