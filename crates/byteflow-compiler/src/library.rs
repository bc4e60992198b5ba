//! Library functions injected into the function table before user code.
//!
//! The two I/O primitives carry native bodies (the dialect has no construct
//! that reads or writes a raw cell); the numeric helpers are written in the
//! dialect itself and go through the normal compilation pipeline, so they
//! follow the same calling convention as user functions for free.

use crate::functions::{FunctionBody, FunctionDef, FunctionTable, ReturnKind};
use crate::parser::{Cursor, TokenBuffer};
use crate::scope::VarDecl;
use crate::Result;

/// Entered at the return-value cell with the character parameter one cell
/// right; prints it and comes back.
const PRINT_CHAR: &str = ">.<";

/// Entered at the return-value cell; reads one input byte into it. End of
/// input reads as 0.
const READ_CHAR: &str = ",";

/// Decimal print of an 8-bit value, no leading zeros.
const PRINT_NUM: &str = "\
void print_num(int n) {
    int h = n / 100;
    int t = (n % 100) / 10;
    if (h) { print_char(h + 48); }
    if (h || t) { print_char(t + 48); }
    print_char(n % 10 + 48);
}";

/// Reads decimal digits until the first non-digit (or end of input).
const READ_NUM: &str = "\
int read_num() {
    int n = 0;
    int c = read_char();
    while (c >= '0' && c <= '9') {
        n = n * 10 + (c - '0');
        c = read_char();
    }
    return n;
}";

/// Registers the library. User definitions are processed afterwards, so a
/// user function with a library name surfaces as a duplicate definition.
pub fn install(table: &mut FunctionTable) -> Result<()> {
    table.insert(FunctionDef {
        name: "print_char".into(),
        returns: ReturnKind::Void,
        params: vec![VarDecl::scalar("c")],
        body: FunctionBody::Native(PRINT_CHAR),
    })?;
    table.insert(FunctionDef {
        name: "read_char".into(),
        returns: ReturnKind::Int,
        params: Vec::new(),
        body: FunctionBody::Native(READ_CHAR),
    })?;

    for source in [PRINT_NUM, READ_NUM] {
        let buffer = TokenBuffer::lex(source)?;
        let mut cursor = Cursor::whole(buffer);
        let def = FunctionDef::parse(&mut cursor)?;
        table.insert(def)?;
    }
    Ok(())
}
