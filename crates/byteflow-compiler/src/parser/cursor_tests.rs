use super::{Cursor, TokenBuffer, TokenKind};
use crate::Error;

fn cursor(source: &str) -> Cursor {
    Cursor::whole(TokenBuffer::lex(source).unwrap())
}

#[test]
fn peek_and_advance() {
    let mut c = cursor("int x = 5;");
    assert_eq!(c.current().unwrap().kind, TokenKind::KwInt);
    assert_eq!(c.peek(1).unwrap().kind, TokenKind::Id);
    c.advance(2);
    assert_eq!(c.current().unwrap().kind, TokenKind::Assign);
    c.advance(10);
    assert!(c.at_end());
    assert!(c.current().is_none());
}

#[test]
fn find_matching_respects_nesting() {
    let c = cursor("{ a { b } { } c }");
    assert_eq!(c.find_matching(0).unwrap(), 10);
    assert_eq!(c.find_matching(2).unwrap(), 4);
}

#[test]
fn find_matching_works_for_each_delimiter() {
    let c = cursor("( [ { } ] )");
    assert_eq!(c.find_matching(0).unwrap(), 5);
    assert_eq!(c.find_matching(1).unwrap(), 4);
    assert_eq!(c.find_matching(2).unwrap(), 3);
}

#[test]
fn unmatched_delimiter_is_a_syntax_error() {
    let c = cursor("( a ");
    let err = c.find_matching(0).unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    assert!(err.to_string().contains("unmatched"));
}

#[test]
fn expect_quotes_the_offending_token() {
    let c = cursor("int 5;");
    let err = c.expect_at(1, TokenKind::Id).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("identifier"), "{msg}");
    assert!(msg.contains("'5' (line 1, column 5)"), "{msg}");
}

#[test]
fn expect_reports_end_of_code() {
    let c = cursor("int");
    let err = c.expect_at(5, TokenKind::Semicolon).unwrap_err();
    assert!(err.to_string().contains("end of code"));
}

#[test]
fn sub_range_cursors_are_independent() {
    let buf = TokenBuffer::lex("a b c d e").unwrap();
    let mut sub = Cursor::new(buf.clone(), 1, 4);
    assert_eq!(sub.len(), 3);
    assert_eq!(buf.text(sub.current().unwrap()), "b");
    sub.advance(2);
    assert_eq!(buf.text(sub.current().unwrap()), "d");
    assert_eq!(sub.peek(1), None);

    let mut again = Cursor::new(buf, 1, 4);
    assert_eq!(again.pos(), 0);
    again.jump_to(1);
    assert_eq!(again.pos(), 1);
}
